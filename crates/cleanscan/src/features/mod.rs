//! Numeric feature extraction for the detectors.

mod projection;
mod projector;

pub use projection::{Projection, project_2d};
pub use projector::{FeatureProjector, ProjectorConfig, Scaler, StandardizedMatrix};

//! Manual labeling of rows, independent of the detectors.

mod store;

pub use store::{Annotation, AnnotationStore, Label};

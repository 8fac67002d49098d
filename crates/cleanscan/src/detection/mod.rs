//! Unsupervised anomaly detectors over a standardized matrix.
//!
//! Both detectors return one label per matrix row, in matrix order.

mod autoencoder;
mod isolation;

pub use autoencoder::{Autoencoder, AutoencoderConfig};
pub use isolation::{IsolationForest, IsolationForestConfig};

use serde::{Deserialize, Serialize};

/// One 0/1 label per matrix row; 1 marks an anomaly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelVector(Vec<u8>);

impl LabelVector {
    /// All-normal labels for `len` rows.
    pub fn zeros(len: usize) -> Self {
        Self(vec![0; len])
    }

    /// Build from per-row flags.
    pub fn from_bools<I: IntoIterator<Item = bool>>(flags: I) -> Self {
        Self(flags.into_iter().map(u8::from).collect())
    }

    /// Get the number of labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no labels.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a row is flagged. Out-of-range rows are not.
    pub fn is_flagged(&self, row: usize) -> bool {
        self.0.get(row).is_some_and(|&l| l == 1)
    }

    /// Label of one row.
    pub fn get(&self, row: usize) -> Option<u8> {
        self.0.get(row).copied()
    }

    /// Number of flagged rows.
    pub fn flagged_count(&self) -> usize {
        self.0.iter().filter(|&&l| l == 1).count()
    }

    /// Raw labels.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for LabelVector {
    /// Any nonzero value counts as flagged.
    fn from(labels: Vec<u8>) -> Self {
        Self(labels.into_iter().map(|l| u8::from(l != 0)).collect())
    }
}

/// What a detector produced for one matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectorOutcome {
    /// One label per matrix row.
    pub labels: LabelVector,
    /// Per-row score: anomaly score for the isolation forest, reconstruction
    /// error for the autoencoder. Empty when the detector did not score.
    pub scores: Vec<f64>,
    /// Decision threshold on `scores`, when the detector uses one.
    pub threshold: Option<f64>,
    /// The model failed to train and the labels are a fallback.
    pub degraded: bool,
}

impl DetectorOutcome {
    /// All-normal outcome without scores.
    pub fn unscored(rows: usize) -> Self {
        Self {
            labels: LabelVector::zeros(rows),
            ..Default::default()
        }
    }

    /// Fallback outcome after a training failure.
    pub fn degraded(rows: usize) -> Self {
        Self {
            degraded: true,
            ..Self::unscored(rows)
        }
    }
}

/// Percentile with linear interpolation between closest ranks.
pub(crate) fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_vector() {
        let labels = LabelVector::from_bools([false, true, true, false]);
        assert_eq!(labels.len(), 4);
        assert_eq!(labels.flagged_count(), 2);
        assert!(labels.is_flagged(1));
        assert!(!labels.is_flagged(9));
        assert_eq!(LabelVector::from(vec![0, 3]).as_slice(), &[0, 1]);
    }

    #[test]
    fn test_label_vector_serializes_as_array() {
        let json = serde_json::to_string(&LabelVector::from_bools([true, false])).unwrap();
        assert_eq!(json, "[1,0]");
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 50.0), 3.0);
        assert_eq!(percentile(&values, 100.0), 5.0);
        assert!((percentile(&values, 95.0) - 4.8).abs() < 1e-12);
        assert_eq!(percentile(&[7.0], 95.0), 7.0);
    }

    #[test]
    fn test_degraded_outcome() {
        let outcome = DetectorOutcome::degraded(3);
        assert!(outcome.degraded);
        assert_eq!(outcome.labels, LabelVector::zeros(3));
        assert!(outcome.scores.is_empty());
    }
}

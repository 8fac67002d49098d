//! Merging the two detectors' labels into one verdict per row.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::detection::LabelVector;
use crate::error::{PipelineError, Result};

/// Agreement category of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Neither detector flagged the row.
    Normal,
    /// Both detectors flagged the row.
    AgreedAnomaly,
    /// Only the isolation forest flagged the row.
    DensityOnly,
    /// Only the autoencoder flagged the row.
    ReconstructionOnly,
}

impl Verdict {
    /// All verdicts, in report order.
    pub const ALL: [Verdict; 4] = [
        Verdict::Normal,
        Verdict::AgreedAnomaly,
        Verdict::DensityOnly,
        Verdict::ReconstructionOnly,
    ];

    /// Verdict for a pair of labels.
    pub fn from_flags(density: bool, reconstruction: bool) -> Self {
        match (density, reconstruction) {
            (true, true) => Verdict::AgreedAnomaly,
            (true, false) => Verdict::DensityOnly,
            (false, true) => Verdict::ReconstructionOnly,
            (false, false) => Verdict::Normal,
        }
    }

    /// Stable identifier, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Normal => "normal",
            Verdict::AgreedAnomaly => "agreed_anomaly",
            Verdict::DensityOnly => "density_only",
            Verdict::ReconstructionOnly => "reconstruction_only",
        }
    }

    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Normal => "Normal",
            Verdict::AgreedAnomaly => "Agreed anomaly",
            Verdict::DensityOnly => "Isolation forest only",
            Verdict::ReconstructionOnly => "Autoencoder only",
        }
    }

    /// Whether at least one detector flagged the row.
    pub fn is_anomaly(&self) -> bool {
        !matches!(self, Verdict::Normal)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verdict counts for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub total: usize,
    pub normal: usize,
    pub agreed_anomaly: usize,
    pub density_only: usize,
    pub reconstruction_only: usize,
    /// Rows flagged by the isolation forest.
    pub density_flagged: usize,
    /// Rows flagged by the autoencoder.
    pub reconstruction_flagged: usize,
    /// The isolation forest output is a fallback.
    #[serde(default)]
    pub density_degraded: bool,
    /// The autoencoder output is a fallback.
    #[serde(default)]
    pub reconstruction_degraded: bool,
}

impl ReconciliationSummary {
    /// Count of one verdict.
    pub fn count(&self, verdict: Verdict) -> usize {
        match verdict {
            Verdict::Normal => self.normal,
            Verdict::AgreedAnomaly => self.agreed_anomaly,
            Verdict::DensityOnly => self.density_only,
            Verdict::ReconstructionOnly => self.reconstruction_only,
        }
    }

    /// Record which detectors fell back to all-normal labels.
    pub fn with_degraded(mut self, density: bool, reconstruction: bool) -> Self {
        self.density_degraded = density;
        self.reconstruction_degraded = reconstruction;
        self
    }

    /// Fraction of flagged rows both detectors agree on, as a percentage.
    pub fn agreement_rate(&self) -> f64 {
        let flagged = self.total - self.normal;
        if flagged == 0 {
            100.0
        } else {
            (self.agreed_anomaly as f64 / flagged as f64) * 100.0
        }
    }
}

/// Per-row verdicts plus their summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    /// One verdict per matrix row.
    pub verdicts: Vec<Verdict>,
    pub summary: ReconciliationSummary,
}

impl Reconciliation {
    /// Matrix rows with the given verdict, in order.
    pub fn indices(&self, verdict: Verdict) -> Vec<usize> {
        self.verdicts
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == verdict)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Get the number of rows.
    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }
}

/// Combine two label vectors index by index.
///
/// Vectors of different lengths are an alignment error; nothing is truncated.
pub fn reconcile(density: &LabelVector, reconstruction: &LabelVector) -> Result<Reconciliation> {
    if density.len() != reconstruction.len() {
        return Err(PipelineError::Alignment {
            density: density.len(),
            reconstruction: reconstruction.len(),
        });
    }

    let mut summary = ReconciliationSummary {
        total: density.len(),
        density_flagged: density.flagged_count(),
        reconstruction_flagged: reconstruction.flagged_count(),
        ..Default::default()
    };

    let verdicts: Vec<Verdict> = (0..density.len())
        .map(|row| Verdict::from_flags(density.is_flagged(row), reconstruction.is_flagged(row)))
        .collect();

    for verdict in &verdicts {
        match verdict {
            Verdict::Normal => summary.normal += 1,
            Verdict::AgreedAnomaly => summary.agreed_anomaly += 1,
            Verdict::DensityOnly => summary.density_only += 1,
            Verdict::ReconstructionOnly => summary.reconstruction_only += 1,
        }
    }

    Ok(Reconciliation { verdicts, summary })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_way_split() {
        let density = LabelVector::from(vec![1, 1, 0, 0, 0]);
        let reconstruction = LabelVector::from(vec![1, 0, 1, 0, 0]);
        let r = reconcile(&density, &reconstruction).unwrap();

        assert_eq!(
            r.verdicts,
            vec![
                Verdict::AgreedAnomaly,
                Verdict::DensityOnly,
                Verdict::ReconstructionOnly,
                Verdict::Normal,
                Verdict::Normal,
            ]
        );
        assert_eq!(r.summary.total, 5);
        assert_eq!(r.summary.normal, 2);
        assert_eq!(r.summary.density_flagged, 2);
        assert_eq!(r.summary.reconstruction_flagged, 2);
        assert_eq!(r.indices(Verdict::Normal), vec![3, 4]);
    }

    #[test]
    fn test_counts_add_up() {
        let density = LabelVector::from(vec![1, 0, 1, 1, 0, 0, 1]);
        let reconstruction = LabelVector::from(vec![0, 0, 1, 0, 1, 0, 1]);
        let s = reconcile(&density, &reconstruction).unwrap().summary;

        let sum: usize = Verdict::ALL.iter().map(|v| s.count(*v)).sum();
        assert_eq!(sum, s.total);
        assert_eq!(s.agreed_anomaly + s.density_only, s.density_flagged);
        assert_eq!(s.agreed_anomaly + s.reconstruction_only, s.reconstruction_flagged);
    }

    #[test]
    fn test_length_mismatch() {
        let err = reconcile(&LabelVector::zeros(10), &LabelVector::zeros(11)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Alignment {
                density: 10,
                reconstruction: 11
            }
        ));
    }

    #[test]
    fn test_empty() {
        let r = reconcile(&LabelVector::zeros(0), &LabelVector::zeros(0)).unwrap();
        assert!(r.is_empty());
        assert_eq!(r.summary, ReconciliationSummary::default());
        assert_eq!(r.summary.agreement_rate(), 100.0);
    }

    #[test]
    fn test_verdict_serialization() {
        let json = serde_json::to_string(&Verdict::ReconstructionOnly).unwrap();
        assert_eq!(json, "\"reconstruction_only\"");
        assert_eq!(Verdict::AgreedAnomaly.to_string(), "agreed_anomaly");
    }
}

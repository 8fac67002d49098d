//! Isolation forest density detector.
//!
//! Anomalies are isolated by fewer random axis-aligned splits than normal
//! rows, so their average path length over the forest is short.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::features::StandardizedMatrix;

use super::{DetectorOutcome, LabelVector, percentile};

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Configuration for the isolation forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationForestConfig {
    /// Number of trees.
    pub n_trees: usize,
    /// Subsample size per tree (capped at the row count).
    pub max_samples: usize,
    /// Expected fraction of anomalies, in (0, 1).
    pub contamination: f64,
    /// Seed for subsampling and splits.
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            contamination: 0.01,
            seed: 42,
        }
    }
}

impl IsolationForestConfig {
    /// Set the expected anomaly fraction.
    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of trees.
    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination < 1.0) {
            return Err(PipelineError::Config(format!(
                "contamination must be in (0, 1), got {}",
                self.contamination
            )));
        }
        if self.n_trees == 0 {
            return Err(PipelineError::Config("n_trees must be at least 1".into()));
        }
        if self.max_samples < 2 {
            return Err(PipelineError::Config(format!(
                "max_samples must be at least 2, got {}",
                self.max_samples
            )));
        }
        Ok(())
    }
}

enum Node {
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

impl Node {
    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    value,
                    left,
                    right,
                } => {
                    node = if row[*feature] < *value { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful search in a binary search tree
/// of `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    height_limit: usize,
    rng: &'a mut fastrand::Rng,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, indices: &[usize], depth: usize) -> Node {
        if depth >= self.height_limit || indices.len() <= 1 {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        // Only features that still vary can split this node.
        let width = self.rows[indices[0]].len();
        let candidates: Vec<(usize, f64, f64)> = (0..width)
            .filter_map(|feature| {
                let (min, max) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| {
                        let v = self.rows[i][feature];
                        (lo.min(v), hi.max(v))
                    },
                );
                (max > min).then_some((feature, min, max))
            })
            .collect();

        if candidates.is_empty() {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        let (feature, min, max) = candidates[self.rng.usize(..candidates.len())];
        let mut value = min + self.rng.f64() * (max - min);
        if value <= min {
            value = min + (max - min) / 2.0;
        }

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.rows[i][feature] < value);

        Node::Split {
            feature,
            value,
            left: Box::new(self.grow(&left, depth + 1)),
            right: Box::new(self.grow(&right, depth + 1)),
        }
    }
}

/// Seeded isolation forest.
#[derive(Debug, Clone, Default)]
pub struct IsolationForest {
    config: IsolationForestConfig,
}

impl IsolationForest {
    /// Create a forest with the given configuration.
    pub fn new(config: IsolationForestConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &IsolationForestConfig {
        &self.config
    }

    /// Fit the forest on the matrix and label its rows.
    ///
    /// Rows whose average path is strictly shorter than the interpolated
    /// `contamination` percentile of all average paths are flagged. Scores
    /// are `2^(-E[h] / c(sample size))`, higher meaning more anomalous, and
    /// the threshold is the score at that percentile.
    pub fn detect(&self, matrix: &StandardizedMatrix) -> Result<DetectorOutcome> {
        self.config.validate()?;

        let n = matrix.row_count();
        if n <= 1 {
            debug!(rows = n, "too few rows for isolation forest");
            return Ok(DetectorOutcome::unscored(n));
        }

        let sample_size = self.config.max_samples.min(n);
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = fastrand::Rng::with_seed(self.config.seed);

        let mut population: Vec<usize> = (0..n).collect();
        let mut trees = Vec::with_capacity(self.config.n_trees);
        for _ in 0..self.config.n_trees {
            // Partial Fisher-Yates: the first `sample_size` slots are the subsample.
            for i in 0..sample_size {
                let j = rng.usize(i..n);
                population.swap(i, j);
            }
            let mut builder = TreeBuilder {
                rows: &matrix.rows,
                height_limit,
                rng: &mut rng,
            };
            trees.push(builder.grow(&population[..sample_size], 0));
        }

        let mean_paths: Vec<f64> = matrix
            .rows
            .iter()
            .map(|row| trees.iter().map(|t| t.path_length(row)).sum::<f64>() / trees.len() as f64)
            .collect();

        let normalizer = average_path_length(sample_size);
        let scores: Vec<f64> = mean_paths
            .iter()
            .map(|&h| 2f64.powf(-h / normalizer))
            .collect();

        // Rows isolated strictly faster than the contamination percentile of
        // path lengths are anomalies.
        let cutoff = percentile(&mean_paths, self.config.contamination * 100.0);
        let flags: Vec<bool> = mean_paths.iter().map(|&h| h < cutoff).collect();
        let flagged = flags.iter().filter(|&&f| f).count();
        let threshold = Some(2f64.powf(-cutoff / normalizer));

        info!(
            rows = n,
            trees = trees.len(),
            sample_size,
            flagged,
            "isolation forest scored"
        );

        Ok(DetectorOutcome {
            labels: LabelVector::from_bools(flags),
            scores,
            threshold,
            degraded: false,
        })
    }
}

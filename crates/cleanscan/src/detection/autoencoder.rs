//! Bottleneck autoencoder reconstruction detector.
//!
//! Rows the network reconstructs poorly are flagged: the error threshold is
//! a percentile of the per-row errors on the training matrix itself.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::features::StandardizedMatrix;

use super::{DetectorOutcome, LabelVector, percentile};

/// Configuration for the autoencoder detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoencoderConfig {
    /// Width of the two hidden layers around the code.
    pub hidden: usize,
    /// Width of the code layer (capped below the input width).
    pub latent: usize,
    /// Passes over the matrix.
    pub epochs: usize,
    /// Rows per optimizer step.
    pub batch_size: usize,
    /// Adam step size.
    pub learning_rate: f64,
    /// Error percentile above which rows are flagged, in [0, 100].
    pub percentile: f64,
    /// Seed for weight init and shuffling.
    pub seed: u64,
    /// Wall-clock limit on training, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_budget_ms: Option<u64>,
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            hidden: 16,
            latent: 8,
            epochs: 30,
            batch_size: 32,
            learning_rate: 0.001,
            percentile: 95.0,
            seed: 42,
            training_budget_ms: None,
        }
    }
}

impl AutoencoderConfig {
    /// Set the error percentile.
    pub fn with_percentile(mut self, percentile: f64) -> Self {
        self.percentile = percentile;
        self
    }

    /// Set the number of epochs.
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Set the learning rate.
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Limit training wall-clock time.
    pub fn with_training_budget(mut self, budget: Duration) -> Self {
        self.training_budget_ms = Some(budget.as_millis() as u64);
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(PipelineError::Config(format!(
                "percentile must be in [0, 100], got {}",
                self.percentile
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(PipelineError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 || self.batch_size == 0 || self.hidden == 0 || self.latent == 0 {
            return Err(PipelineError::Config(
                "epochs, batch_size, hidden and latent must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Code width for an input of `width` columns.
    pub fn latent_width(&self, width: usize) -> usize {
        self.latent.min(width.saturating_sub(1).max(1))
    }
}

// =============================================================================
// NETWORK
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Activation {
    Relu,
    Linear,
}

/// Fully connected layer with its Adam moments.
#[derive(Debug, Clone)]
struct Dense {
    inputs: usize,
    outputs: usize,
    /// `outputs x inputs`, row-major.
    weights: Vec<f64>,
    bias: Vec<f64>,
    activation: Activation,
    grad_w: Vec<f64>,
    grad_b: Vec<f64>,
    m_w: Vec<f64>,
    v_w: Vec<f64>,
    m_b: Vec<f64>,
    v_b: Vec<f64>,
}

impl Dense {
    /// Glorot-uniform weights, zero biases.
    fn new(inputs: usize, outputs: usize, activation: Activation, rng: &mut fastrand::Rng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| (rng.f64() * 2.0 - 1.0) * limit)
            .collect();
        let size = inputs * outputs;
        Self {
            inputs,
            outputs,
            weights,
            bias: vec![0.0; outputs],
            activation,
            grad_w: vec![0.0; size],
            grad_b: vec![0.0; outputs],
            m_w: vec![0.0; size],
            v_w: vec![0.0; size],
            m_b: vec![0.0; outputs],
            v_b: vec![0.0; outputs],
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        (0..self.outputs)
            .map(|o| {
                let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
                let z = self.bias[o] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>();
                match self.activation {
                    Activation::Relu => z.max(0.0),
                    Activation::Linear => z,
                }
            })
            .collect()
    }

    /// Accumulate gradients for one sample and return the gradient with
    /// respect to the layer input.
    fn backward(&mut self, input: &[f64], output: &[f64], grad_output: &[f64]) -> Vec<f64> {
        let mut grad_input = vec![0.0; self.inputs];
        for o in 0..self.outputs {
            let delta = match self.activation {
                // ReLU output is zero exactly where its pre-activation was clipped.
                Activation::Relu if output[o] <= 0.0 => 0.0,
                _ => grad_output[o],
            };
            if delta == 0.0 {
                continue;
            }
            self.grad_b[o] += delta;
            let base = o * self.inputs;
            for i in 0..self.inputs {
                self.grad_w[base + i] += delta * input[i];
                grad_input[i] += delta * self.weights[base + i];
            }
        }
        grad_input
    }

    fn adam_step(&mut self, optimizer: &Adam, step: i32) {
        optimizer.update(&mut self.weights, &mut self.grad_w, &mut self.m_w, &mut self.v_w, step);
        optimizer.update(&mut self.bias, &mut self.grad_b, &mut self.m_b, &mut self.v_b, step);
    }
}

#[derive(Debug, Clone, Copy)]
struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
}

impl Adam {
    fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }

    /// Apply and clear accumulated gradients.
    fn update(&self, params: &mut [f64], grads: &mut [f64], m: &mut [f64], v: &mut [f64], step: i32) {
        let correction1 = 1.0 - self.beta1.powi(step);
        let correction2 = 1.0 - self.beta2.powi(step);
        for i in 0..params.len() {
            let g = grads[i];
            m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
            v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;
            let m_hat = m[i] / correction1;
            let v_hat = v[i] / correction2;
            params[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            grads[i] = 0.0;
        }
    }
}

struct Network {
    layers: Vec<Dense>,
}

impl Network {
    fn new(width: usize, hidden: usize, latent: usize, rng: &mut fastrand::Rng) -> Self {
        let shape = [
            (width, hidden, Activation::Relu),
            (hidden, latent, Activation::Relu),
            (latent, hidden, Activation::Relu),
            (hidden, width, Activation::Linear),
        ];
        Self {
            layers: shape
                .into_iter()
                .map(|(i, o, a)| Dense::new(i, o, a, rng))
                .collect(),
        }
    }

    /// Activations of every layer, input first.
    fn forward_all(&self, row: &[f64]) -> Vec<Vec<f64>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(row.to_vec());
        for layer in &self.layers {
            let next = layer.forward(&activations[activations.len() - 1]);
            activations.push(next);
        }
        activations
    }

    fn reconstruct(&self, row: &[f64]) -> Vec<f64> {
        self.layers
            .iter()
            .fold(row.to_vec(), |input, layer| layer.forward(&input))
    }

    /// One optimizer step on a batch; returns the batch MSE.
    fn train_batch(&mut self, rows: &[&Vec<f64>], optimizer: &Adam, step: i32) -> f64 {
        let width = rows[0].len();
        let scale = 2.0 / (rows.len() * width) as f64;
        let mut loss = 0.0;

        for row in rows {
            let activations = self.forward_all(row);
            let output = &activations[activations.len() - 1];
            let mut grad: Vec<f64> = output
                .iter()
                .zip(row.iter())
                .map(|(o, x)| {
                    loss += (o - x).powi(2);
                    scale * (o - x)
                })
                .collect();

            for (idx, layer) in self.layers.iter_mut().enumerate().rev() {
                grad = layer.backward(&activations[idx], &activations[idx + 1], &grad);
            }
        }

        for layer in &mut self.layers {
            layer.adam_step(optimizer, step);
        }
        loss / (rows.len() * width) as f64
    }
}

/// Mean squared reconstruction error of one row.
fn row_error(original: &[f64], reconstructed: &[f64]) -> f64 {
    let sum: f64 = original
        .iter()
        .zip(reconstructed)
        .map(|(a, b)| (a - b).powi(2))
        .sum();
    sum / original.len() as f64
}

/// Reconstruction-error detector.
#[derive(Debug, Clone, Default)]
pub struct Autoencoder {
    config: AutoencoderConfig,
}

impl Autoencoder {
    /// Create a detector with the given configuration.
    pub fn new(config: AutoencoderConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &AutoencoderConfig {
        &self.config
    }

    /// Train on the matrix and flag rows whose reconstruction error lies
    /// strictly above the configured percentile.
    ///
    /// A diverging loss is not an error: the outcome is all-normal and
    /// marked degraded. Running past the training budget is.
    pub fn detect(&self, matrix: &StandardizedMatrix) -> Result<DetectorOutcome> {
        self.config.validate()?;

        let n = matrix.row_count();
        let width = matrix.column_count();
        if n < 2 || width == 0 {
            debug!(rows = n, "too few rows for autoencoder");
            return Ok(DetectorOutcome::unscored(n));
        }

        let mut rng = fastrand::Rng::with_seed(self.config.seed);
        let latent = self.config.latent_width(width);
        let mut network = Network::new(width, self.config.hidden, latent, &mut rng);
        let optimizer = Adam::new(self.config.learning_rate);
        let budget = self.config.training_budget_ms.map(Duration::from_millis);

        let started = Instant::now();
        let mut order: Vec<usize> = (0..n).collect();
        let mut step = 0i32;
        let mut last_loss = f64::NAN;

        for epoch in 0..self.config.epochs {
            rng.shuffle(&mut order);
            let mut epoch_loss = 0.0;
            let mut batches = 0usize;

            for chunk in order.chunks(self.config.batch_size) {
                let batch: Vec<&Vec<f64>> = chunk.iter().map(|&i| &matrix.rows[i]).collect();
                step = step.saturating_add(1);
                epoch_loss += network.train_batch(&batch, &optimizer, step);
                batches += 1;

                if let Some(budget) = budget {
                    let elapsed = started.elapsed();
                    if elapsed > budget {
                        return Err(PipelineError::TrainingBudgetExceeded {
                            elapsed_ms: elapsed.as_millis(),
                            budget_ms: budget.as_millis(),
                        });
                    }
                }
            }

            last_loss = epoch_loss / batches as f64;
            if !last_loss.is_finite() {
                warn!(epoch, loss = last_loss, "autoencoder loss diverged, labels fall back to normal");
                return Ok(DetectorOutcome::degraded(n));
            }
            debug!(epoch, loss = last_loss, "autoencoder epoch");
        }

        let errors: Vec<f64> = matrix
            .rows
            .iter()
            .map(|row| row_error(row, &network.reconstruct(row)))
            .collect();
        if errors.iter().any(|e| !e.is_finite()) {
            warn!("non-finite reconstruction error, labels fall back to normal");
            return Ok(DetectorOutcome::degraded(n));
        }

        let threshold = percentile(&errors, self.config.percentile);
        let labels = LabelVector::from_bools(errors.iter().map(|&e| e > threshold));

        info!(
            rows = n,
            latent,
            epochs = self.config.epochs,
            loss = last_loss,
            threshold,
            flagged = labels.flagged_count(),
            "autoencoder scored"
        );

        Ok(DetectorOutcome {
            labels,
            scores: errors,
            threshold: Some(threshold),
            degraded: false,
        })
    }
}

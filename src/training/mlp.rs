//! Multi-layer perceptron regressor
//!
//! Feedforward network with ReLU hidden units, linear output and
//! mini-batch SGD with momentum.

use ndarray::{s, Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SerplensError};

use super::Regressor;

/// MLP hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Width of each hidden layer
    pub hidden_layers: Vec<usize>,
    /// SGD step size
    pub learning_rate: f64,
    /// Upper bound on training epochs
    pub max_epochs: usize,
    /// Rows per mini-batch
    pub batch_size: usize,
    /// L2 penalty strength
    pub alpha: f64,
    /// Seed for weight init and batch shuffling (None draws from entropy)
    pub random_state: Option<u64>,
    /// Epochs without validation improvement before stopping
    pub early_stopping_patience: usize,
    /// Fraction of rows held out for early stopping (0 disables)
    pub validation_split: f64,
    /// Momentum coefficient
    pub momentum: f64,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            learning_rate: 0.001,
            max_epochs: 1000,
            batch_size: 32,
            alpha: 0.0001,
            random_state: Some(42),
            early_stopping_patience: 10,
            validation_split: 0.1,
            momentum: 0.9,
        }
    }
}

fn seeded_rng(seed: Option<u64>) -> Xoshiro256PlusPlus {
    match seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_entropy(),
    }
}

fn mean_squared_error(truth: &Array1<f64>, pred: &Array1<f64>) -> f64 {
    let diff = truth - pred;
    diff.mapv(|d| d * d).mean().unwrap_or(0.0)
}

fn relu(z: &Array2<f64>) -> Array2<f64> {
    z.mapv(|v| v.max(0.0))
}

fn relu_prime(z: &Array2<f64>) -> Array2<f64> {
    z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

/// Multi-layer perceptron regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPRegressor {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    is_fitted: bool,
}

impl Default for MLPRegressor {
    fn default() -> Self {
        Self::new(MLPConfig::default())
    }
}

impl MLPRegressor {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    /// Borrow the configuration
    pub fn config(&self) -> &MLPConfig {
        &self.config
    }

    fn initialize_weights(&mut self, n_outputs: usize) {
        let mut rng = seeded_rng(self.config.random_state);

        let mut widths = vec![self.n_features];
        widths.extend(&self.config.hidden_layers);
        widths.push(n_outputs);

        self.weights = widths
            .windows(2)
            .map(|pair| {
                let (n_in, n_out) = (pair[0], pair[1]);
                // Xavier/Glorot scaling
                let scale = (2.0 / (n_in + n_out) as f64).sqrt();
                Array2::from_shape_fn((n_in, n_out), |_| rng.gen::<f64>() * 2.0 * scale - scale)
            })
            .collect();
        self.biases = widths[1..].iter().map(|&width| Array1::zeros(width)).collect();
    }

    /// Forward pass. Returns per-layer outputs (input first, prediction last)
    /// and the pre-activation of every layer.
    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let depth = self.weights.len();
        let mut layer_outputs = vec![x.clone()];
        let mut pre_activations = Vec::with_capacity(depth);

        for (layer, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let z = layer_outputs[layer].dot(w) + b;
            // The output layer stays linear for regression
            let out = if layer + 1 < depth { relu(&z) } else { z.clone() };
            pre_activations.push(z);
            layer_outputs.push(out);
        }

        (layer_outputs, pre_activations)
    }

    /// Backpropagate the MSE loss, yielding (weight, bias) gradients per layer
    fn backward(
        &self,
        targets: &Array1<f64>,
        layer_outputs: &[Array2<f64>],
        pre_activations: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let depth = self.weights.len();
        let batch = targets.len() as f64;

        let target_col = targets.view().insert_axis(Axis(1));
        let mut error = (layer_outputs[depth].clone() - &target_col) / batch;

        let mut grads: Vec<(Array2<f64>, Array1<f64>)> = Vec::with_capacity(depth);
        for layer in (0..depth).rev() {
            let w_grad = layer_outputs[layer].t().dot(&error);
            let b_grad = error.sum_axis(Axis(0));
            grads.push((w_grad, b_grad));

            if layer > 0 {
                error = error.dot(&self.weights[layer].t()) * relu_prime(&pre_activations[layer - 1]);
            }
        }

        grads.reverse();
        grads
    }

    fn forward_output(&self, x: &Array2<f64>) -> Array1<f64> {
        let (layer_outputs, _) = self.forward(x);
        layer_outputs.last().unwrap().column(0).to_owned()
    }
}

impl Regressor for MLPRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(SerplensError::EmptyDataset);
        }
        if n_samples != y.len() {
            return Err(SerplensError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        self.n_features = x.ncols();
        self.initialize_weights(1);
        let mut rng = seeded_rng(self.config.random_state);

        // Hold out the tail for early stopping
        let n_holdout = (n_samples as f64 * self.config.validation_split) as usize;
        let n_fit = n_samples - n_holdout;
        if n_fit == 0 {
            return Err(SerplensError::TrainingError(
                "validation split leaves no training rows".to_string(),
            ));
        }

        let x_fit = x.slice(s![..n_fit, ..]);
        let y_fit = y.slice(s![..n_fit]);
        let x_holdout = x.slice(s![n_fit.., ..]).to_owned();
        let y_holdout = y.slice(s![n_fit..]).to_owned();

        let mut w_velocity: Vec<Array2<f64>> = self
            .weights
            .iter()
            .map(|w| Array2::zeros(w.raw_dim()))
            .collect();
        let mut b_velocity: Vec<Array1<f64>> = self
            .biases
            .iter()
            .map(|b| Array1::zeros(b.raw_dim()))
            .collect();

        let mut best_loss = f64::INFINITY;
        let mut stale_epochs = 0;
        let mut order: Vec<usize> = (0..n_fit).collect();

        for _epoch in 0..self.config.max_epochs {
            order.shuffle(&mut rng);

            for chunk in order.chunks(self.config.batch_size) {
                let x_batch = x_fit.select(Axis(0), chunk);
                let y_batch = y_fit.select(Axis(0), chunk);

                let (layer_outputs, pre_activations) = self.forward(&x_batch);
                let grads = self.backward(&y_batch, &layer_outputs, &pre_activations);

                let decay = 1.0 - self.config.alpha * self.config.learning_rate;
                for (layer, (w_grad, b_grad)) in grads.into_iter().enumerate() {
                    w_velocity[layer] = &w_velocity[layer] * self.config.momentum
                        - &w_grad * self.config.learning_rate;
                    b_velocity[layer] = &b_velocity[layer] * self.config.momentum
                        - &b_grad * self.config.learning_rate;

                    // Momentum step, then multiplicative L2 decay on weights
                    self.weights[layer] = (&self.weights[layer] + &w_velocity[layer]) * decay;
                    self.biases[layer] = &self.biases[layer] + &b_velocity[layer];
                }
            }

            if n_holdout > 0 {
                let holdout_pred = self.forward_output(&x_holdout);
                let loss = mean_squared_error(&y_holdout, &holdout_pred);
                if loss < best_loss {
                    best_loss = loss;
                    stale_epochs = 0;
                } else {
                    stale_epochs += 1;
                    if stale_epochs >= self.config.early_stopping_patience {
                        break;
                    }
                }
            }
        }

        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(SerplensError::ModelNotFitted);
        }
        Ok(self.forward_output(x))
    }
}

//! Feed-forward regressor: ReLU hidden layers, linear output, MSE loss, Adam updates
//!
//! Training is full batch. Early stopping watches the training MSE and stops once it has not
//! improved for `patience` consecutive epochs.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::{check_training_shapes, Predictions, Regressor};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct MlpConfig {
    /// Units per hidden layer
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    pub epochs: usize,
    /// Epochs without improvement before training stops
    pub patience: usize,
    /// Seed for weight initialization
    pub seed: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![40, 30, 25],
            learning_rate: 3.5e-5,
            epochs: 900,
            patience: 8,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
struct DenseLayer {
    weights: Array2<f64>,
    biases: Array1<f64>,
    relu: bool,
}

impl DenseLayer {
    /// Glorot uniform weights, zero biases
    fn new(input_size: usize, output_size: usize, relu: bool, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (input_size + output_size) as f64).sqrt();
        let weights = Array2::from_shape_fn((input_size, output_size), |_| rng.gen_range(-limit..limit));
        Self {
            weights,
            biases: Array1::zeros(output_size),
            relu,
        }
    }

    /// Returns `(pre-activation, activation)`
    fn forward(&self, input: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let z = input.dot(&self.weights) + &self.biases;
        let a = if self.relu { z.mapv(|v| v.max(0.0)) } else { z.clone() };
        (z, a)
    }
}

/// Adam moments for one layer
#[derive(Debug, Clone)]
struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: i32,
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

impl Adam {
    fn new(learning_rate: f64, layer: &DenseLayer) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
            m_w: Array2::zeros(layer.weights.dim()),
            v_w: Array2::zeros(layer.weights.dim()),
            m_b: Array1::zeros(layer.biases.len()),
            v_b: Array1::zeros(layer.biases.len()),
        }
    }

    fn step(&mut self, layer: &mut DenseLayer, weight_grad: &Array2<f64>, bias_grad: &Array1<f64>) {
        self.t += 1;
        let (b1, b2) = (self.beta1, self.beta2);
        let correction1 = 1.0 - b1.powi(self.t);
        let correction2 = 1.0 - b2.powi(self.t);

        self.m_w = &self.m_w * b1 + weight_grad * (1.0 - b1);
        self.v_w = &self.v_w * b2 + &(weight_grad * weight_grad) * (1.0 - b2);
        let m_hat = &self.m_w / correction1;
        let v_hat = &self.v_w / correction2;
        layer.weights -= &(m_hat * self.learning_rate / (v_hat.mapv(f64::sqrt) + self.epsilon));

        self.m_b = &self.m_b * b1 + bias_grad * (1.0 - b1);
        self.v_b = &self.v_b * b2 + &(bias_grad * bias_grad) * (1.0 - b2);
        let m_hat = &self.m_b / correction1;
        let v_hat = &self.v_b / correction2;
        layer.biases -= &(m_hat * self.learning_rate / (v_hat.mapv(f64::sqrt) + self.epsilon));
    }
}

/// A fitted network
#[derive(Debug, Clone)]
pub struct TrainedMlp {
    layers: Vec<DenseLayer>,
    /// Training MSE after every epoch that ran
    pub loss_history: Vec<f64>,
}

impl TrainedMlp {
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let expected = self.layers.first().map(|l| l.weights.nrows()).unwrap_or(0);
        if x.ncols() != expected {
            return Err(Error::InvalidInput(format!(
                "network expects {} features, got {}",
                expected,
                x.ncols()
            )));
        }
        let mut output = x.clone();
        for layer in &self.layers {
            output = layer.forward(&output).1;
        }
        Ok(output)
    }

    pub fn epochs_run(&self) -> usize {
        self.loss_history.len()
    }
}

pub struct MlpRegressor {
    config: MlpConfig,
}

impl MlpRegressor {
    pub fn new(config: MlpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MlpConfig {
        &self.config
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array2<f64>) -> Result<TrainedMlp> {
        if x.nrows() == 0 || x.nrows() != y.nrows() {
            return Err(Error::InvalidInput(format!(
                "cannot fit {} feature rows against {} label rows",
                x.nrows(),
                y.nrows()
            )));
        }
        if self.config.hidden_layers.iter().any(|&units| units == 0) {
            return Err(Error::Model("hidden layers need at least one unit".to_string()));
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut sizes = vec![x.ncols()];
        sizes.extend(&self.config.hidden_layers);
        sizes.push(y.ncols());

        let mut layers: Vec<DenseLayer> = sizes
            .windows(2)
            .enumerate()
            .map(|(i, w)| DenseLayer::new(w[0], w[1], i + 2 < sizes.len(), &mut rng))
            .collect();
        let mut optimizers: Vec<Adam> = layers
            .iter()
            .map(|layer| Adam::new(self.config.learning_rate, layer))
            .collect();

        info!(
            "Training MLP {:?} for up to {} epochs (lr={}, patience={})",
            sizes, self.config.epochs, self.config.learning_rate, self.config.patience
        );

        let mut loss_history = Vec::with_capacity(self.config.epochs);
        let mut best = f64::INFINITY;
        let mut stale = 0usize;

        for epoch in 0..self.config.epochs {
            // Forward pass, keeping every layer's input and pre-activation
            let mut inputs = Vec::with_capacity(layers.len());
            let mut pre_activations = Vec::with_capacity(layers.len());
            let mut output = x.clone();
            for layer in &layers {
                let (z, a) = layer.forward(&output);
                inputs.push(output);
                pre_activations.push(z);
                output = a;
            }

            let diff = &output - y;
            let loss = diff.mapv(|d| d * d).sum() / diff.len() as f64;
            if !loss.is_finite() {
                return Err(Error::Model(format!("training diverged at epoch {}", epoch + 1)));
            }
            loss_history.push(loss);

            // Backward pass
            let mut gradient = diff * (2.0 / output.len() as f64);
            for i in (0..layers.len()).rev() {
                let delta = if layers[i].relu {
                    let mask = pre_activations[i].mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
                    gradient * mask
                } else {
                    gradient
                };
                let weight_grad = inputs[i].t().dot(&delta);
                let bias_grad = delta.sum_axis(Axis(0));
                gradient = delta.dot(&layers[i].weights.t());
                optimizers[i].step(&mut layers[i], &weight_grad, &bias_grad);
            }

            if (epoch + 1) % 100 == 0 {
                debug!("Epoch {}/{}: mse = {:.6}", epoch + 1, self.config.epochs, loss);
            }

            if loss < best {
                best = loss;
                stale = 0;
            } else {
                stale += 1;
                if stale >= self.config.patience {
                    info!("Early stopping at epoch {} (best mse {:.6})", epoch + 1, best);
                    break;
                }
            }
        }

        Ok(TrainedMlp { layers, loss_history })
    }
}

impl Regressor for MlpRegressor {
    fn name(&self) -> &'static str {
        "mlp"
    }

    fn train_and_predict(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array2<f64>,
        x_test: &Array2<f64>,
    ) -> Result<Predictions> {
        check_training_shapes(x_train, y_train, x_test)?;
        let model = self.fit(x_train, y_train)?;
        Ok(Predictions {
            test: model.predict(x_test)?,
            train: model.predict(x_train)?,
            best_params: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_problem() -> (Array2<f64>, Array2<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(r, c)| ((r * 3 + c * 5) % 11) as f64 / 10.0);
        let y = Array2::from_shape_fn((40, 2), |(r, c)| {
            if c == 0 {
                2.0 * x[[r, 0]] + x[[r, 1]]
            } else {
                x[[r, 0]] - x[[r, 1]]
            }
        });
        (x, y)
    }

    fn fast_config() -> MlpConfig {
        MlpConfig {
            hidden_layers: vec![8, 8],
            learning_rate: 0.01,
            epochs: 300,
            patience: 8,
            seed: 7,
        }
    }

    #[test]
    fn test_training_reduces_loss() {
        let (x, y) = linear_problem();
        let model = MlpRegressor::new(fast_config()).fit(&x, &y).unwrap();
        let first = model.loss_history[0];
        let last = *model.loss_history.last().unwrap();
        assert!(last < first * 0.5, "loss {} -> {}", first, last);
    }

    #[test]
    fn test_output_sized_to_labels() {
        let (x, y) = linear_problem();
        let preds = MlpRegressor::new(fast_config())
            .train_and_predict(&x, &y, &x.slice(ndarray::s![..5, ..]).to_owned())
            .unwrap();
        assert_eq!(preds.test.dim(), (5, 2));
        assert_eq!(preds.train.dim(), (40, 2));
        assert!(preds.best_params.is_none());
    }

    #[test]
    fn test_seeded_training_is_deterministic() {
        let (x, y) = linear_problem();
        let regressor = MlpRegressor::new(fast_config());
        let a = regressor.train_and_predict(&x, &y, &x).unwrap();
        let b = regressor.train_and_predict(&x, &y, &x).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_early_stopping() {
        let (x, y) = linear_problem();
        let config = MlpConfig {
            learning_rate: 0.0,
            patience: 3,
            ..fast_config()
        };
        // zero learning rate never improves, so training stops after 1 + patience epochs
        let model = MlpRegressor::new(config).fit(&x, &y).unwrap();
        assert_eq!(model.epochs_run(), 4);
    }

    #[test]
    fn test_rejects_mismatched_shapes() {
        let (x, y) = linear_problem();
        let regressor = MlpRegressor::new(fast_config());
        assert!(regressor.train_and_predict(&x, &y, &Array2::zeros((2, 3))).is_err());
        let model = regressor.fit(&x, &y).unwrap();
        assert!(model.predict(&Array2::zeros((1, 5))).is_err());
    }
}

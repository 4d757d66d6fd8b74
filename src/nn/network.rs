//! Multi-layer perceptron in pure Rust on top of nalgebra

use super::checkpoint::{Checkpoint, LayerParams};
use super::{Architecture, ModelError, ModelResult};
use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Anything that turns an instance matrix into per-row class scores.
///
/// Column 0 of the output is the smell score.
pub trait Scorer {
    fn score(&self, inputs: &DMatrix<f64>) -> ModelResult<DMatrix<f64>>;
}

/// Feed-forward classifier with softmax output
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    architecture: Architecture,
    /// Per layer, `[inputs x outputs]`
    weights: Vec<DMatrix<f64>>,
    /// Per layer, `[outputs]`
    biases: Vec<DVector<f64>>,
}

/// Intermediate values of a forward pass, kept for backpropagation
struct ForwardPass {
    /// Input of every linear layer (after dropout for hidden layers)
    inputs: Vec<DMatrix<f64>>,
    /// Hidden activations before dropout
    hidden: Vec<DMatrix<f64>>,
    /// Inverted-dropout masks, `None` when dropout is off
    masks: Vec<Option<DMatrix<f64>>>,
    probabilities: DMatrix<f64>,
}

impl Network {
    /// Create a network with Glorot-uniform weights and zero biases
    pub fn new<R: Rng + ?Sized>(architecture: Architecture, rng: &mut R) -> Self {
        let mut weights = Vec::new();
        let mut biases = Vec::new();
        for (fan_in, fan_out) in architecture.layer_shapes() {
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            weights.push(DMatrix::from_fn(fan_in, fan_out, |_, _| {
                rng.random_range(-limit..limit)
            }));
            biases.push(DVector::zeros(fan_out));
        }
        Self {
            architecture,
            weights,
            biases,
        }
    }

    /// Create a network with a seed for reproducibility
    pub fn with_seed(architecture: Architecture, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self::new(architecture, &mut rng)
    }

    /// All parameters set to zero; meant to be overwritten by a checkpoint
    pub fn zeros(architecture: Architecture) -> Self {
        let (weights, biases): (Vec<DMatrix<f64>>, Vec<DVector<f64>>) = architecture
            .layer_shapes()
            .into_iter()
            .map(|(i, o)| (DMatrix::zeros(i, o), DVector::zeros(o)))
            .unzip();
        Self {
            architecture,
            weights,
            biases,
        }
    }

    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    /// Class probabilities for every row of `inputs`, dropout disabled
    pub fn predict(&self, inputs: &DMatrix<f64>) -> ModelResult<DMatrix<f64>> {
        self.check_inputs(inputs)?;
        Ok(self.forward::<ChaCha8Rng>(inputs, 1.0, None).probabilities)
    }

    /// Mean cross-entropy plus `beta * sum(W^2) / 2`, dropout disabled
    pub fn loss(&self, inputs: &DMatrix<f64>, labels: &DMatrix<f64>, beta: f64) -> ModelResult<f64> {
        self.check_inputs(inputs)?;
        self.check_labels(inputs, labels)?;
        let pass = self.forward::<ChaCha8Rng>(inputs, 1.0, None);
        Ok(self.objective(&pass.probabilities, labels, beta))
    }

    /// One gradient-descent update on the whole batch.
    ///
    /// Returns the objective of the forward pass that produced the gradient.
    pub fn train_step<R: Rng + ?Sized>(
        &mut self,
        inputs: &DMatrix<f64>,
        labels: &DMatrix<f64>,
        learning_rate: f64,
        beta: f64,
        keep_prob: f64,
        rng: &mut R,
    ) -> ModelResult<f64> {
        self.check_inputs(inputs)?;
        self.check_labels(inputs, labels)?;

        let pass = self.forward(inputs, keep_prob, Some(rng));
        let loss = self.objective(&pass.probabilities, labels, beta);

        let n = inputs.nrows().max(1) as f64;
        // softmax + cross-entropy gradient
        let mut delta = (&pass.probabilities - labels) / n;

        for layer in (0..self.weights.len()).rev() {
            let grad_w = pass.inputs[layer].transpose() * &delta + &self.weights[layer] * beta;
            let grad_b = DVector::from_iterator(delta.ncols(), delta.column_iter().map(|c| c.sum()));

            if layer > 0 {
                let mut upstream = &delta * self.weights[layer].transpose();
                if let Some(mask) = &pass.masks[layer - 1] {
                    upstream.component_mul_assign(mask);
                }
                let activation = self.architecture.activation;
                let derivative = pass.hidden[layer - 1].map(|y| activation.derivative_from_output(y));
                upstream.component_mul_assign(&derivative);
                delta = upstream;
            }

            self.weights[layer] -= grad_w * learning_rate;
            self.biases[layer] -= grad_b * learning_rate;
        }

        Ok(loss)
    }

    fn forward<R: Rng + ?Sized>(
        &self,
        inputs: &DMatrix<f64>,
        keep_prob: f64,
        mut rng: Option<&mut R>,
    ) -> ForwardPass {
        let last = self.weights.len() - 1;
        let mut layer_inputs = vec![inputs.clone()];
        let mut hidden = Vec::with_capacity(last);
        let mut masks = Vec::with_capacity(last);

        for layer in 0..last {
            let activation = self.architecture.activation;
            let h = affine(&layer_inputs[layer], &self.weights[layer], &self.biases[layer])
                .map(|z| activation.apply(z));

            let mask = match rng.as_deref_mut() {
                Some(rng) if keep_prob < 1.0 => Some(DMatrix::from_fn(h.nrows(), h.ncols(), |_, _| {
                    if rng.random::<f64>() < keep_prob {
                        1.0 / keep_prob
                    } else {
                        0.0
                    }
                })),
                _ => None,
            };
            let dropped = match &mask {
                Some(m) => h.component_mul(m),
                None => h.clone(),
            };

            hidden.push(h);
            masks.push(mask);
            layer_inputs.push(dropped);
        }

        let logits = affine(&layer_inputs[last], &self.weights[last], &self.biases[last]);
        ForwardPass {
            inputs: layer_inputs,
            hidden,
            masks,
            probabilities: softmax_rows(logits),
        }
    }

    fn objective(&self, probabilities: &DMatrix<f64>, labels: &DMatrix<f64>, beta: f64) -> f64 {
        let n = probabilities.nrows().max(1) as f64;
        let cross_entropy = -probabilities
            .zip_map(labels, |p, y| y * p.max(1e-12).ln())
            .sum()
            / n;
        let l2: f64 = self.weights.iter().map(|w| w.norm_squared()).sum::<f64>() / 2.0;
        cross_entropy + beta * l2
    }

    fn check_inputs(&self, inputs: &DMatrix<f64>) -> ModelResult<()> {
        if inputs.ncols() != self.architecture.input_size {
            return Err(ModelError::InputWidth {
                expected: self.architecture.input_size,
                actual: inputs.ncols(),
            });
        }
        Ok(())
    }

    fn check_labels(&self, inputs: &DMatrix<f64>, labels: &DMatrix<f64>) -> ModelResult<()> {
        if labels.nrows() != inputs.nrows() || labels.ncols() != self.architecture.output_size {
            return Err(ModelError::LabelShape {
                expected_rows: inputs.nrows(),
                rows: labels.nrows(),
                cols: labels.ncols(),
            });
        }
        Ok(())
    }

    /// Serializable copy of the parameters
    pub fn to_checkpoint(&self) -> Checkpoint {
        let layers = self
            .weights
            .iter()
            .zip(&self.biases)
            .map(|(w, b)| LayerParams {
                weights: w.row_iter().map(|r| r.iter().copied().collect()).collect(),
                bias: b.iter().copied().collect(),
            })
            .collect();
        Checkpoint::new(self.architecture.clone(), layers)
    }

    /// Overwrite every parameter from a checkpoint of the same shape
    pub fn load_params(&mut self, checkpoint: &Checkpoint) -> ModelResult<()> {
        let shapes = self.architecture.layer_shapes();
        if checkpoint.layers.len() != shapes.len() {
            return Err(ModelError::LayerCount {
                expected: shapes.len(),
                found: checkpoint.layers.len(),
            });
        }

        let mut weights = Vec::with_capacity(shapes.len());
        let mut biases = Vec::with_capacity(shapes.len());
        for (layer, (params, &(fan_in, fan_out))) in checkpoint.layers.iter().zip(&shapes).enumerate() {
            let rows = params.weights.len();
            let cols = params.weights.first().map(|r| r.len()).unwrap_or(0);
            let ragged = params.weights.iter().any(|r| r.len() != cols);
            if rows != fan_in || cols != fan_out || ragged || params.bias.len() != fan_out {
                return Err(ModelError::LayerShape {
                    layer,
                    expected: (fan_in, fan_out),
                    found: (rows, cols),
                });
            }
            let flat: Vec<f64> = params.weights.iter().flatten().copied().collect();
            weights.push(DMatrix::from_row_slice(rows, cols, &flat));
            biases.push(DVector::from_column_slice(&params.bias));
        }

        self.weights = weights;
        self.biases = biases;
        Ok(())
    }

    /// Rebuild a network from a checkpoint
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> ModelResult<Self> {
        let mut network = Self::zeros(checkpoint.architecture.clone());
        network.load_params(checkpoint)?;
        Ok(network)
    }
}

impl Scorer for Network {
    fn score(&self, inputs: &DMatrix<f64>) -> ModelResult<DMatrix<f64>> {
        self.predict(inputs)
    }
}

/// `input * weights` with the bias added to every row
fn affine(input: &DMatrix<f64>, weights: &DMatrix<f64>, bias: &DVector<f64>) -> DMatrix<f64> {
    let mut z = input * weights;
    for (j, mut col) in z.column_iter_mut().enumerate() {
        col.add_scalar_mut(bias[j]);
    }
    z
}

fn softmax_rows(mut logits: DMatrix<f64>) -> DMatrix<f64> {
    for mut row in logits.row_iter_mut() {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }
        for v in row.iter_mut() {
            *v /= sum;
        }
    }
    logits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::Activation;

    fn arch(input: usize, hidden: Vec<usize>) -> Architecture {
        Architecture::new(input, hidden, Activation::Relu)
    }

    /// Two separable blobs: smells have large first features
    fn toy_problem() -> (DMatrix<f64>, DMatrix<f64>) {
        let x = DMatrix::from_row_slice(
            6,
            3,
            &[
                2.0, 1.5, 0.1, //
                1.8, 2.2, -0.2, //
                2.5, 1.9, 0.0, //
                -1.9, -2.1, 0.3, //
                -2.2, -1.7, -0.1, //
                -1.6, -2.4, 0.2,
            ],
        );
        let y = DMatrix::from_row_slice(
            6,
            2,
            &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
        );
        (x, y)
    }

    #[test]
    fn test_forward_probabilities_sum_to_one() {
        let network = Network::with_seed(arch(4, vec![8, 5]), 42);
        let x = DMatrix::from_fn(3, 4, |i, j| (i as f64 - j as f64) * 0.3);
        let p = network.predict(&x).unwrap();
        assert_eq!(p.shape(), (3, 2));
        for row in p.row_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = Network::with_seed(arch(3, vec![4]), 7);
        let b = Network::with_seed(arch(3, vec![4]), 7);
        let c = Network::with_seed(arch(3, vec![4]), 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_training_reduces_loss() {
        let (x, y) = toy_problem();
        let mut network = Network::with_seed(
            Architecture::new(3, vec![8, 4], Activation::Tanh),
            1,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let before = network.loss(&x, &y, 0.0).unwrap();
        for _ in 0..200 {
            network.train_step(&x, &y, 0.1, 0.0, 1.0, &mut rng).unwrap();
        }
        let after = network.loss(&x, &y, 0.0).unwrap();
        assert!(after < before, "loss {} -> {}", before, after);

        let p = network.predict(&x).unwrap();
        for i in 0..3 {
            assert!(p[(i, 0)] > 0.5);
        }
        for i in 3..6 {
            assert!(p[(i, 0)] < 0.5);
        }
    }

    #[test]
    fn test_training_with_dropout_and_l2() {
        let (x, y) = toy_problem();
        let mut network = Network::with_seed(
            Architecture::new(3, vec![16], Activation::Tanh),
            3,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let before = network.loss(&x, &y, 0.01).unwrap();
        for _ in 0..300 {
            network.train_step(&x, &y, 0.1, 0.01, 0.8, &mut rng).unwrap();
        }
        assert!(network.loss(&x, &y, 0.01).unwrap() < before);
    }

    #[test]
    fn test_l2_term_increases_objective() {
        let (x, y) = toy_problem();
        let network = Network::with_seed(arch(3, vec![4]), 2);
        let plain = network.loss(&x, &y, 0.0).unwrap();
        let penalized = network.loss(&x, &y, 0.5).unwrap();
        assert!(penalized > plain);
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        let network = Network::with_seed(arch(3, vec![4]), 2);
        let x = DMatrix::zeros(2, 5);
        assert!(matches!(
            network.predict(&x),
            Err(ModelError::InputWidth { expected: 3, actual: 5 })
        ));
        let x = DMatrix::zeros(2, 3);
        let y = DMatrix::zeros(3, 2);
        assert!(matches!(network.loss(&x, &y, 0.0), Err(ModelError::LabelShape { .. })));
    }

    #[test]
    fn test_checkpoint_roundtrip_preserves_predictions() {
        let network = Network::with_seed(arch(3, vec![5, 4]), 9);
        let restored = Network::from_checkpoint(&network.to_checkpoint()).unwrap();
        assert_eq!(network, restored);
    }

    #[test]
    fn test_load_params_rejects_other_shape() {
        let small = Network::with_seed(arch(3, vec![4]), 1);
        let mut big = Network::zeros(arch(3, vec![6]));
        assert!(matches!(
            big.load_params(&small.to_checkpoint()),
            Err(ModelError::LayerShape { layer: 0, .. })
        ));
    }
}

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::data::images::{ImageShape, Layout};
use crate::data::loader::Batch;
use crate::error::{BenchError, Result};
use crate::layers::dense::Layer;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;
use crate::objective::Classifier;
use crate::optim::optimizer::Optimizer;

/// Feed-forward classifier trained by the imperative engine.
///
/// Inputs are flattened channel-first images; the last layer is expected to
/// be a softmax so that outputs are class probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
}

/// Batch-averaged gradients, one `(weights, biases)` pair per layer.
#[derive(Debug, Clone)]
pub struct NetworkGradients {
    pub layers: Vec<(Matrix, Vec<f64>)>,
    /// Mean cross-entropy of the batch the gradients came from.
    pub loss: f64,
}

impl Network {
    /// Builds a network from (size, input_size, activation) tuples.
    pub fn new<R: Rng + ?Sized>(layer_specs: Vec<(usize, usize, ActivationFunction)>, rng: &mut R) -> Network {
        let layers = layer_specs.into_iter()
            .map(|(size, input_size, activation)| Layer::new(size, input_size, activation, rng))
            .collect();
        Network { layers }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.input_size)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.size)
    }

    /// Fails unless the first layer takes exactly one image of `shape`.
    pub fn check_input(&self, shape: ImageShape) -> Result<()> {
        if self.input_size() != shape.len() {
            return Err(BenchError::config(format!(
                "network expects {} inputs but images have {}x{}x{} = {} values",
                self.input_size(), shape.channels, shape.height, shape.width, shape.len()
            )));
        }
        Ok(())
    }

    /// Forward pass.
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer.feed_from(&current).1;
        }
        current
    }

    /// Forward pass keeping every layer's `(z, a)` for backprop.
    fn forward_cached(&self, input: &[f64]) -> Vec<(Vec<f64>, Vec<f64>)> {
        let mut cache: Vec<(Vec<f64>, Vec<f64>)> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let previous = cache.last().map_or(input, |(_, a)| a.as_slice());
            let step = layer.feed_from(previous);
            cache.push(step);
        }
        cache
    }

    /// Mean cross-entropy gradients over `batch`.
    pub fn gradients(&self, batch: &Batch) -> NetworkGradients {
        let mut acc: Vec<(Matrix, Vec<f64>)> = self.layers.iter()
            .map(|layer| (Matrix::zeros(layer.input_size, layer.size), vec![0.0; layer.size]))
            .collect();
        let mut total_loss = 0.0;

        for (features, label) in batch.iter() {
            let input: Vec<f64> = features.iter().map(|&x| x as f64).collect();
            let cache = self.forward_cached(&input);
            let Some((_, output)) = cache.last() else {
                break;
            };

            total_loss += CrossEntropyLoss::loss(output, label);
            let mut delta = CrossEntropyLoss::derivative(output, label);

            // Backward pass.
            for i in (0..self.layers.len()).rev() {
                let layer_input = if i == 0 { &input } else { &cache[i - 1].1 };
                let grads = self.layers[i].compute_gradients(&delta, &cache[i].0, layer_input);
                acc[i].0.add_assign(&grads.weights);
                for (b, g) in acc[i].1.iter_mut().zip(&grads.biases) {
                    *b += g;
                }
                delta = grads.input_delta;
            }
        }

        let n = batch.len().max(1) as f64;
        for (w, b) in acc.iter_mut() {
            w.data.iter_mut().for_each(|x| *x /= n);
            b.iter_mut().for_each(|x| *x /= n);
        }
        NetworkGradients { layers: acc, loss: total_loss / n }
    }

    /// One forward/backward/update over `batch`. Returns the batch's mean
    /// loss measured before the update.
    pub fn training_step(&mut self, batch: &Batch, optimizer: &mut Optimizer) -> f64 {
        let NetworkGradients { layers, loss } = self.gradients(batch);
        for (i, (w_grad, b_grad)) in layers.into_iter().enumerate() {
            let layer = &mut self.layers[i];
            optimizer.step(2 * i, &mut layer.weights.data, &w_grad.data);
            optimizer.step(2 * i + 1, &mut layer.biases, &b_grad);
        }
        loss
    }

    /// Serializes the network weights to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Network> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl Classifier for Network {
    fn input_layout(&self) -> Layout {
        Layout::ChannelsFirst
    }

    fn predict(&self, sample: &[f32]) -> Vec<f64> {
        let input: Vec<f64> = sample.iter().map(|&x| x as f64).collect();
        self.forward(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::rule::{UpdateRule, WeightDecay};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn classifier() -> Network {
        let mut rng = StdRng::seed_from_u64(3);
        Network::new(
            vec![
                (4, 3, ActivationFunction::Tanh),
                (2, 4, ActivationFunction::Softmax),
            ],
            &mut rng,
        )
    }

    fn batch() -> Batch {
        Batch::from_samples(vec![(vec![0.5, -1.0, 2.0], 1), (vec![-0.3, 0.1, 0.0], 0)], 3)
    }

    #[test]
    fn outputs_are_probabilities() {
        let out = classifier().predict(&[1.0, 2.0, 3.0]);
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let net = classifier();
        let batch = batch();
        let grads = net.gradients(&batch);
        let h = 1e-6;
        for (i, j) in [(0usize, 0usize), (0, 5), (1, 3)] {
            let mut plus = net.clone();
            plus.layers[i].weights.data[j] += h;
            let mut minus = net.clone();
            minus.layers[i].weights.data[j] -= h;
            let numeric = (plus.gradients(&batch).loss - minus.gradients(&batch).loss) / (2.0 * h);
            assert_relative_eq!(grads.layers[i].0.data[j], numeric, epsilon = 1e-6);
        }
    }

    #[test]
    fn plain_sgd_steps_reduce_the_loss() {
        let mut net = classifier();
        let batch = batch();
        let mut optimizer = Optimizer::new(UpdateRule::Sgd { momentum: 0.0, nesterov: false }, 0.5, WeightDecay::None);
        let first = net.training_step(&batch, &mut optimizer);
        for _ in 0..20 {
            net.training_step(&batch, &mut optimizer);
        }
        assert!(net.gradients(&batch).loss < first);
    }

    #[test]
    fn input_check_compares_against_the_image_size() {
        let net = classifier();
        assert!(net.check_input(ImageShape::new(1, 1, 3)).is_ok());
        assert!(matches!(net.check_input(ImageShape::new(3, 1, 1)), Ok(())));
        assert!(matches!(net.check_input(ImageShape::new(3, 2, 2)), Err(BenchError::Config(_))));
    }

    #[test]
    fn json_round_trip_preserves_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        let net = classifier();
        net.save_json(&path).unwrap();
        let loaded = Network::load_json(&path).unwrap();
        assert_eq!(loaded.layers.len(), net.layers.len());
        for (a, b) in loaded.layers.iter().zip(&net.layers) {
            assert_eq!(a.activator, b.activator);
            for (x, y) in a.weights.data.iter().zip(&b.weights.data) {
                assert_relative_eq!(x, y, epsilon = 1e-12);
            }
        }
    }
}

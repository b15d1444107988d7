use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// Fully-connected layer: `a = σ(x W + b)`.
///
/// `weights` has shape (input_size, size) so a sample is a row vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub size: usize,
    pub input_size: usize,
    pub weights: Matrix,
    pub biases: Vec<f64>,
    pub activator: ActivationFunction,
}

/// Gradients produced by one backward step through a [`Layer`].
#[derive(Debug, Clone)]
pub struct LayerGradients {
    pub weights: Matrix,
    pub biases: Vec<f64>,
    /// ∂L/∂x, the error to hand to the previous layer.
    pub input_delta: Vec<f64>,
}

impl Layer {
    /// He-initialized weights before ReLU-family activations, Xavier
    /// otherwise; biases start at zero.
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        let weights = match activation {
            ActivationFunction::ReLU | ActivationFunction::LeakyReLU { .. } => {
                Matrix::he(input_size, size, rng)
            }
            _ => Matrix::xavier(input_size, size, rng),
        };
        Layer {
            size,
            input_size,
            weights,
            biases: vec![0.0; size],
            activator: activation,
        }
    }

    /// Pre-activation `z = x W + b`.
    pub fn pre_activation(&self, input: &[f64]) -> Vec<f64> {
        let mut z = self.weights.vec_mul(input);
        for (zi, b) in z.iter_mut().zip(&self.biases) {
            *zi += b;
        }
        z
    }

    /// Returns `(z, a)`; `z` is kept by the caller for the backward pass.
    pub fn feed_from(&self, input: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let z = self.pre_activation(input);
        let a = self.activator.apply(&z);
        (z, a)
    }

    /// `delta` is ∂L/∂a for this layer, `z` and `input` come from the
    /// matching forward pass.
    pub fn compute_gradients(&self, delta: &[f64], z: &[f64], input: &[f64]) -> LayerGradients {
        // δ = error ⊙ σ'(z)
        let layer_delta: Vec<f64> = delta.iter().zip(z)
            .map(|(d, &zi)| d * self.activator.derivative(zi))
            .collect();

        LayerGradients {
            weights: Matrix::outer(input, &layer_delta),
            input_delta: self.weights.mul_vec(&layer_delta),
            biases: layer_delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tiny_layer() -> Layer {
        Layer {
            size: 2,
            input_size: 2,
            weights: Matrix::from_vec(2, 2, vec![1.0, -1.0, 0.5, 2.0]),
            biases: vec![0.1, -0.2],
            activator: ActivationFunction::Identity,
        }
    }

    #[test]
    fn forward_is_row_vector_times_weights() {
        let (z, a) = tiny_layer().feed_from(&[2.0, 1.0]);
        assert_relative_eq!(z[0], 2.0 + 0.5 + 0.1);
        assert_relative_eq!(z[1], -2.0 + 2.0 - 0.2);
        assert_eq!(z, a);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let layer = tiny_layer();
        let input = [2.0, 1.0];
        // L = sum(a), so ∂L/∂a = 1
        let (z, _) = layer.feed_from(&input);
        let grads = layer.compute_gradients(&[1.0, 1.0], &z, &input);

        let h = 1e-6;
        let mut bumped = layer.clone();
        bumped.weights.data[1] += h;
        let loss = |l: &Layer| l.feed_from(&input).1.iter().sum::<f64>();
        let numeric = (loss(&bumped) - loss(&layer)) / h;
        assert_relative_eq!(grads.weights.data[1], numeric, epsilon = 1e-5);
        assert_eq!(grads.input_delta.len(), 2);
    }
}

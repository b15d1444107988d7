use crate::data::loader::Batch;
use crate::engine::graph::model::GraphModel;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;

/// Gradients of every model variable for one batch.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Same order as [`GraphModel::variables`].
    pub gradients: Vec<Vec<f64>>,
    /// Mean data loss; the L2 term is not included.
    pub loss: f64,
}

/// The compiled train step: mean cross-entropy plus an optional L2 penalty
/// `l2 * Σ w²` over every variable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrainStep {
    pub l2: f64,
}

impl TrainStep {
    pub fn new(l2: f64) -> TrainStep {
        TrainStep { l2 }
    }

    pub fn gradients(&self, model: &GraphModel, batch: &Batch) -> StepOutput {
        let variables = model.variables();
        let mut gradients: Vec<Vec<f64>> = variables.iter().map(|v| vec![0.0; v.value.data.len()]).collect();
        let mut total_loss = 0.0;

        for (features, label) in batch.iter() {
            let input: Vec<f64> = features.iter().map(|&x| x as f64).collect();
            let tape = model.record(&input);
            let Some((_, output)) = tape.last() else {
                break;
            };
            total_loss += CrossEntropyLoss::loss(output, label);
            let mut upstream = CrossEntropyLoss::derivative(output, label);

            for (i, node) in model.nodes().iter().enumerate().rev() {
                let x = if i == 0 { &input } else { &tape[i - 1].1 };
                let delta: Vec<f64> = upstream.iter().zip(&tape[i].0)
                    .map(|(u, &z)| u * node.activation.derivative(z))
                    .collect();

                let kernel = &variables[node.kernel].value;
                let outer = Matrix::outer(x, &delta);
                for (g, d) in gradients[node.kernel].iter_mut().zip(&outer.data) {
                    *g += d;
                }
                for (g, d) in gradients[node.bias].iter_mut().zip(&delta) {
                    *g += d;
                }
                upstream = kernel.mul_vec(&delta);
            }
        }

        let n = batch.len().max(1) as f64;
        for (grad, variable) in gradients.iter_mut().zip(variables) {
            for (g, w) in grad.iter_mut().zip(&variable.value.data) {
                *g /= n;
                if self.l2 != 0.0 {
                    *g += 2.0 * self.l2 * w;
                }
            }
        }
        StepOutput { gradients, loss: total_loss / n }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::data::images::{ImageShape, Layout};
    use crate::network::network::Network;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn data_gradients_agree_with_the_network() {
        let shape = ImageShape::new(1, 1, 3);
        let mut rng = StdRng::seed_from_u64(1);
        let net = Network::new(
            vec![(4, 3, ActivationFunction::Tanh), (2, 4, ActivationFunction::Softmax)],
            &mut rng,
        );
        let model = GraphModel::compile(&net, shape).unwrap();
        // one channel: both layouts coincide
        assert_eq!(shape.offset(Layout::ChannelsLast, 0, 0, 2), 2);
        let batch = Batch::from_samples(vec![(vec![0.1, 0.2, -0.4], 1), (vec![1.0, 0.0, 0.5], 0)], 3);

        let expected = net.gradients(&batch);
        let got = TrainStep::default().gradients(&model, &batch);
        assert_relative_eq!(got.loss, expected.loss, epsilon = 1e-12);
        for (i, (w, b)) in expected.layers.iter().enumerate() {
            for (x, y) in got.gradients[2 * i].iter().zip(&w.data) {
                assert_relative_eq!(x, y, epsilon = 1e-12);
            }
            for (x, y) in got.gradients[2 * i + 1].iter().zip(b) {
                assert_relative_eq!(x, y, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn l2_penalty_adds_twice_l2_times_weight() {
        let shape = ImageShape::new(1, 1, 2);
        let mut rng = StdRng::seed_from_u64(2);
        let net = Network::new(vec![(2, 2, ActivationFunction::Softmax)], &mut rng);
        let model = GraphModel::compile(&net, shape).unwrap();
        let batch = Batch::from_samples(vec![(vec![0.3, -0.7], 0)], 2);
        let plain = TrainStep::new(0.0).gradients(&model, &batch);
        let penalized = TrainStep::new(0.05).gradients(&model, &batch);
        let w = &model.variables()[0].value.data;
        for j in 0..w.len() {
            assert_relative_eq!(penalized.gradients[0][j] - plain.gradients[0][j], 0.1 * w[j], epsilon = 1e-12);
        }
        assert_eq!(penalized.loss, plain.loss);
    }
}

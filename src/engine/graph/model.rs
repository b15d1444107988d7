use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::data::images::{ImageShape, Layout};
use crate::error::Result;
use crate::layers::dense::Layer;
use crate::math::matrix::Matrix;
use crate::network::network::Network;
use crate::objective::Classifier;

/// A trainable parameter of a compiled model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: Matrix,
}

/// One dense node of the compiled graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DenseNode {
    /// Index of the `(inputs, units)` kernel variable.
    pub kernel: usize,
    /// Index of the `(1, units)` bias variable.
    pub bias: usize,
    pub activation: ActivationFunction,
}

/// Activations recorded by a forward pass: `(z, a)` per node.
pub(crate) type Tape = Vec<(Vec<f64>, Vec<f64>)>;

/// A [`Network`] compiled for the graph engine.
///
/// Parameters live in one flat list of named variables and the model reads
/// channel-last images: the first kernel's rows are permuted at compile time
/// so predictions match the source network's on the transposed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphModel {
    variables: Vec<Variable>,
    nodes: Vec<DenseNode>,
    input_shape: ImageShape,
}

impl GraphModel {
    pub fn compile(network: &Network, input_shape: ImageShape) -> Result<GraphModel> {
        network.check_input(input_shape)?;

        let mut variables = Vec::with_capacity(2 * network.layers.len());
        let mut nodes = Vec::with_capacity(network.layers.len());
        for (i, layer) in network.layers.iter().enumerate() {
            let kernel = if i == 0 {
                permute_rows(&layer.weights, input_shape, Layout::ChannelsFirst, Layout::ChannelsLast)
            } else {
                layer.weights.clone()
            };
            nodes.push(DenseNode { kernel: variables.len(), bias: variables.len() + 1, activation: layer.activator });
            variables.push(Variable { name: format!("dense_{i}/kernel"), value: kernel });
            variables.push(Variable { name: format!("dense_{i}/bias"), value: Matrix::row_vector(&layer.biases) });
        }
        Ok(GraphModel { variables, nodes, input_shape })
    }

    /// Exports the trained variables back into a channel-first [`Network`].
    pub fn to_network(&self) -> Network {
        let layers = self.nodes.iter().enumerate()
            .map(|(i, node)| {
                let kernel = &self.variables[node.kernel].value;
                let weights = if i == 0 {
                    permute_rows(kernel, self.input_shape, Layout::ChannelsLast, Layout::ChannelsFirst)
                } else {
                    kernel.clone()
                };
                Layer {
                    size: kernel.cols,
                    input_size: kernel.rows,
                    weights,
                    biases: self.variables[node.bias].value.data.clone(),
                    activator: node.activation,
                }
            })
            .collect();
        Network { layers }
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub(crate) fn variables_mut(&mut self) -> &mut [Variable] {
        &mut self.variables
    }

    pub fn nodes(&self) -> &[DenseNode] {
        &self.nodes
    }

    pub fn input_shape(&self) -> ImageShape {
        self.input_shape
    }

    pub(crate) fn record(&self, input: &[f64]) -> Tape {
        let mut tape: Tape = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let x = tape.last().map_or(input, |(_, a)| a.as_slice());
            let mut z = self.variables[node.kernel].value.vec_mul(x);
            for (zi, b) in z.iter_mut().zip(&self.variables[node.bias].value.data) {
                *zi += b;
            }
            let a = node.activation.apply(&z);
            tape.push((z, a));
        }
        tape
    }

    pub fn call(&self, input: &[f64]) -> Vec<f64> {
        self.record(input).pop().map(|(_, a)| a).unwrap_or_default()
    }
}

impl Classifier for GraphModel {
    fn input_layout(&self) -> Layout {
        Layout::ChannelsLast
    }

    fn predict(&self, sample: &[f32]) -> Vec<f64> {
        let input: Vec<f64> = sample.iter().map(|&x| x as f64).collect();
        self.call(&input)
    }
}

/// Re-orders the rows of a first-layer kernel from one input layout to the
/// other.
fn permute_rows(kernel: &Matrix, shape: ImageShape, from: Layout, to: Layout) -> Matrix {
    let mut out = Matrix::zeros(kernel.rows, kernel.cols);
    for c in 0..shape.channels {
        for h in 0..shape.height {
            for w in 0..shape.width {
                let src = shape.offset(from, c, h, w);
                let dst = shape.offset(to, c, h, w);
                out.data[dst * kernel.cols..(dst + 1) * kernel.cols].copy_from_slice(kernel.row(src));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::images::Images;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn network(shape: ImageShape) -> Network {
        let mut rng = StdRng::seed_from_u64(9);
        Network::new(
            vec![
                (5, shape.len(), ActivationFunction::ReLU),
                (3, 5, ActivationFunction::Softmax),
            ],
            &mut rng,
        )
    }

    #[test]
    fn compiled_model_matches_on_transposed_input() {
        let shape = ImageShape::new(3, 2, 2);
        let net = network(shape);
        let model = GraphModel::compile(&net, shape).unwrap();
        let images = Images::new(Layout::ChannelsFirst, 1, shape, (0..12).map(|x| x as f32 * 0.1 - 0.5).collect())
            .unwrap();
        let last = images.to_layout(Layout::ChannelsLast);
        let a = net.predict(images.sample(0));
        let b = model.predict(last.sample(0));
        for (x, y) in a.iter().zip(&b) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn export_restores_the_network() {
        let shape = ImageShape::new(3, 2, 2);
        let net = network(shape);
        assert_eq!(GraphModel::compile(&net, shape).unwrap().to_network(), net);
    }

    #[test]
    fn variables_are_named_per_layer() {
        let shape = ImageShape::new(1, 2, 2);
        let model = GraphModel::compile(&network(shape), shape).unwrap();
        let names: Vec<&str> = model.variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["dense_0/kernel", "dense_0/bias", "dense_1/kernel", "dense_1/bias"]);
    }

    #[test]
    fn input_size_mismatch_is_rejected() {
        let net = network(ImageShape::new(3, 2, 2));
        assert!(GraphModel::compile(&net, ImageShape::new(3, 4, 4)).is_err());
    }
}

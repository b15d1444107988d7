use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::datasets::DatasetDescription;
use crate::error::{BenchError, Result};
use crate::network::network::Network;
use crate::solver::ModelInitFn;

/// Describes one layer in a network specification.
///
/// Fields:
/// - `size`: number of neurons in this layer
/// - `input_size`: number of neurons feeding into this layer (i.e. the output
///   size of the previous layer, or the raw input dimension for
///   the first layer)
/// - `activation`: activation function applied after the linear transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: usize,
    pub input_size: usize,
    pub activation: ActivationFunction,
}

/// A serializable network architecture, independent of trained weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name used in logs and reports.
    pub name: String,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
}

impl NetworkSpec {
    /// One ReLU hidden layer of `hidden` units and a softmax output sized for
    /// `description`'s three-channel square images.
    pub fn classifier(description: &DatasetDescription, hidden: usize) -> NetworkSpec {
        let input = 3 * description.image_width * description.image_width;
        NetworkSpec {
            name: format!("mlp-{}x{}", hidden, description.n_classes),
            layers: vec![
                LayerSpec { size: hidden, input_size: input, activation: ActivationFunction::ReLU },
                LayerSpec {
                    size: description.n_classes,
                    input_size: hidden,
                    activation: ActivationFunction::Softmax,
                },
            ],
        }
    }

    /// Checks that consecutive layers chain and that the output is a softmax.
    pub fn validate(&self) -> Result<()> {
        let Some(last) = self.layers.last() else {
            return Err(BenchError::config(format!("network '{}' has no layers", self.name)));
        };
        for (i, pair) in self.layers.windows(2).enumerate() {
            if pair[0].size != pair[1].input_size {
                return Err(BenchError::config(format!(
                    "network '{}': layer {} outputs {} values but layer {} expects {}",
                    self.name, i, pair[0].size, i + 1, pair[1].input_size
                )));
            }
        }
        if last.activation != ActivationFunction::Softmax {
            return Err(BenchError::config(format!(
                "network '{}': the output layer must use softmax", self.name
            )));
        }
        Ok(())
    }

    /// Instantiates fresh weights from `seed`.
    pub fn build(&self, seed: u64) -> Result<Network> {
        self.validate()?;
        Ok(self.instantiate(seed))
    }

    fn instantiate(&self, seed: u64) -> Network {
        let mut rng = StdRng::seed_from_u64(seed);
        Network::new(
            self.layers.iter().map(|l| (l.size, l.input_size, l.activation)).collect(),
            &mut rng,
        )
    }

    /// A factory returning identical initial weights on every call.
    pub fn model_init_fn(self, seed: u64) -> Result<ModelInitFn> {
        self.validate()?;
        Ok(Arc::new(move || self.instantiate(seed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> DatasetDescription {
        DatasetDescription { n_samples_train: 8, n_samples_test: 2, image_width: 4, n_classes: 3 }
    }

    #[test]
    fn classifier_matches_the_dataset() {
        let net = NetworkSpec::classifier(&description(), 16).build(0).unwrap();
        assert_eq!(net.input_size(), 48);
        assert_eq!(net.output_size(), 3);
    }

    #[test]
    fn init_fn_is_deterministic() {
        let init = NetworkSpec::classifier(&description(), 8).model_init_fn(42).unwrap();
        assert_eq!(init(), init());
    }

    #[test]
    fn broken_chain_is_rejected() {
        let mut spec = NetworkSpec::classifier(&description(), 8);
        spec.layers[1].input_size = 7;
        assert!(matches!(spec.build(0), Err(BenchError::Config(_))));
    }
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::images::{ImageShape, Images, Layout};
use crate::datasets::{DataKind, Dataset, DatasetDescription, DatasetPayload, DatasetSource, Framework};
use crate::error::{BenchError, Result};
use crate::math::sample_standard_normal;

/// Random three-channel images with uniformly drawn labels.
///
/// The same `random_state` yields the same samples for every framework;
/// only the container and layout differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedDataset {
    pub n_samples: usize,
    pub img_size: usize,
    pub n_classes: usize,
    pub train_frac: f64,
    pub framework: Framework,
    pub random_state: u64,
}

impl Default for SimulatedDataset {
    fn default() -> Self {
        SimulatedDataset {
            n_samples: 10,
            img_size: 32,
            n_classes: 2,
            train_frac: 0.8,
            framework: Framework::Imperative,
            random_state: 27,
        }
    }
}

impl SimulatedDataset {
    pub fn new(n_samples: usize, img_size: usize, framework: Framework) -> SimulatedDataset {
        SimulatedDataset { n_samples, img_size, framework, ..Default::default() }
    }

    /// Same parameters, other framework selector. Unknown names are rejected.
    pub fn with_framework(self, framework: &str) -> Result<SimulatedDataset> {
        Ok(SimulatedDataset { framework: framework.parse()?, ..self })
    }

    pub fn n_train(&self) -> usize {
        (self.n_samples as f64 * self.train_frac) as usize
    }

    pub fn description(&self) -> DatasetDescription {
        let n_train = self.n_train();
        DatasetDescription {
            n_samples_train: n_train,
            n_samples_test: self.n_samples - n_train,
            image_width: self.img_size,
            n_classes: self.n_classes,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.n_classes == 0 {
            return Err(BenchError::config("simulated dataset needs at least one class"));
        }
        if !(0.0..=1.0).contains(&self.train_frac) {
            return Err(BenchError::config(format!(
                "train_frac must lie in [0, 1], got {}", self.train_frac
            )));
        }
        Ok(())
    }

    /// Channel-first samples and labels, drawn afresh from `random_state`.
    fn generate(&self) -> Result<(Images, Vec<usize>)> {
        let mut rng = StdRng::seed_from_u64(self.random_state);
        let shape = ImageShape::new(3, self.img_size, self.img_size);
        let pixels = (0..self.n_samples * shape.len())
            .map(|_| sample_standard_normal(&mut rng) as f32)
            .collect();
        let labels = (0..self.n_samples).map(|_| rng.gen_range(0..self.n_classes)).collect();
        Ok((Images::new(Layout::ChannelsFirst, self.n_samples, shape, pixels)?, labels))
    }
}

impl DatasetSource for SimulatedDataset {
    fn name(&self) -> &str {
        "Simulated"
    }

    fn framework(&self) -> Framework {
        self.framework
    }

    fn get_data(&self) -> Result<(DataKind, DatasetPayload)> {
        self.validate()?;
        let (images, mut labels) = self.generate()?;
        let n_train = self.n_train();
        let (train_images, test_images) = images.split_at(n_train);
        let test_labels = labels.split_off(n_train);

        debug!(framework = %self.framework, n_train, n_test = test_labels.len(), "simulated dataset");
        Ok((
            DataKind::Object,
            DatasetPayload {
                dataset: Dataset::for_framework(self.framework, train_images, labels)?,
                test_dataset: Dataset::for_framework(self.framework, test_images, test_labels)?,
                framework: self.framework,
                description: self.description(),
            },
        ))
    }
}

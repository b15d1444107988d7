use std::sync::Arc;

use rand::rngs::StdRng;

use crate::data::images::{ImageShape, Images, Layout};
use crate::error::{BenchError, Result};

/// Random-access dataset consumed by the imperative engine's loader.
///
/// `get` receives a per-sample generator so that augmentation stays
/// reproducible when samples are fetched on worker threads.
pub trait MapDataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shape(&self) -> ImageShape;

    /// Channel-first features and class label of sample `index`.
    fn get(&self, index: usize, rng: &mut StdRng) -> (Vec<f32>, usize);
}

/// Indexable `(image, label)` pairs in channel-first layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorDataset {
    images: Images,
    labels: Arc<[usize]>,
}

impl TensorDataset {
    pub fn new(images: Images, labels: Vec<usize>) -> Result<TensorDataset> {
        if images.layout() != Layout::ChannelsFirst {
            return Err(BenchError::dataset("tensor datasets store channel-first images"));
        }
        if images.len() != labels.len() {
            return Err(BenchError::dataset(format!(
                "{} images but {} labels", images.len(), labels.len()
            )));
        }
        Ok(TensorDataset { images, labels: labels.into() })
    }

    pub fn images(&self) -> &Images {
        &self.images
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn sample(&self, index: usize) -> (&[f32], usize) {
        (self.images.sample(index), self.labels[index])
    }
}

impl MapDataset for TensorDataset {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn shape(&self) -> ImageShape {
        self.images.shape()
    }

    fn get(&self, index: usize, _rng: &mut StdRng) -> (Vec<f32>, usize) {
        let (features, label) = self.sample(index);
        (features.to_vec(), label)
    }
}

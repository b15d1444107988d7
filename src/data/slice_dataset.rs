use std::sync::Arc;

use crate::data::images::{ImageShape, Images, Layout};
use crate::data::loader::Batch;
use crate::error::{BenchError, Result};

/// Sequential `(image, label)` elements in channel-last layout, consumed by
/// the graph engine in fixed-size batches.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceDataset {
    images: Images,
    labels: Arc<[usize]>,
}

impl SliceDataset {
    /// Slices along the first axis. Channel-first input is transposed.
    pub fn from_tensor_slices(images: Images, labels: Vec<usize>) -> Result<SliceDataset> {
        if images.len() != labels.len() {
            return Err(BenchError::dataset(format!(
                "{} images but {} labels", images.len(), labels.len()
            )));
        }
        Ok(SliceDataset {
            images: images.to_layout(Layout::ChannelsLast),
            labels: labels.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn shape(&self) -> ImageShape {
        self.images.shape()
    }

    pub fn images(&self) -> &Images {
        &self.images
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn element(&self, index: usize) -> (&[f32], usize) {
        (self.images.sample(index), self.labels[index])
    }

    /// Consecutive batches; the last one may be short.
    pub fn batch(&self, batch_size: usize) -> SliceBatches<'_> {
        SliceBatches { dataset: self, batch_size: batch_size.max(1), position: 0 }
    }
}

pub struct SliceBatches<'a> {
    dataset: &'a SliceDataset,
    batch_size: usize,
    position: usize,
}

impl Iterator for SliceBatches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let len = self.dataset.len();
        if self.position >= len {
            return None;
        }
        let end = (self.position + self.batch_size).min(len);
        let batch = Batch::from_samples(
            (self.position..end).map(|i| {
                let (features, label) = self.dataset.element(i);
                (features.to_vec(), label)
            }),
            self.dataset.shape().len(),
        );
        self.position = end;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_cover_every_element_once() {
        let shape = ImageShape::new(1, 1, 2);
        let images = Images::new(Layout::ChannelsFirst, 5, shape, (0..10).map(|x| x as f32).collect()).unwrap();
        let ds = SliceDataset::from_tensor_slices(images, vec![0, 1, 0, 1, 0]).unwrap();
        let sizes: Vec<usize> = ds.batch(2).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        let last = ds.batch(2).last().unwrap();
        assert_eq!(last.sample(0), &[8.0, 9.0]);
    }
}

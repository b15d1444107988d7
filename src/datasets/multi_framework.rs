use tracing::debug;

use crate::data::images::{ImageShape, Images, Layout, RawImages};
use crate::datasets::{DataKind, Dataset, DatasetDescription, DatasetPayload, DatasetSource, Framework};
use crate::error::{BenchError, Result};

/// Per-channel affine normalization applied after scaling pixels to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: f32,
    pub std: f32,
}

impl Normalization {
    #[inline]
    pub fn apply(&self, pixel: u8) -> f32 {
        (pixel as f32 / 255.0 - self.mean) / self.std
    }
}

/// Raw 8-bit images a [`MultiFrameworkDataset`] is built from.
pub trait ImageSource {
    fn name(&self) -> &str;

    fn n_classes(&self) -> usize;

    fn normalization(&self) -> Normalization;

    /// Train and test splits, channel-first.
    fn load(&self) -> Result<(RawImages, RawImages)>;
}

/// Serves an [`ImageSource`] to either engine.
///
/// Both engines see the same normalized values; grayscale sources are
/// broadcast to three channels, by repeating channel planes for the
/// imperative engine and by tiling each pixel for the graph engine.
#[derive(Debug, Clone)]
pub struct MultiFrameworkDataset<S> {
    source: S,
    framework: Framework,
}

impl<S: ImageSource> MultiFrameworkDataset<S> {
    pub fn new(source: S, framework: Framework) -> MultiFrameworkDataset<S> {
        MultiFrameworkDataset { source, framework }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn prepare(&self, raw: &RawImages) -> Result<Dataset> {
        let norm = self.source.normalization();
        let images = match self.framework {
            Framework::Imperative => repeat_channels(raw, norm)?,
            Framework::Graph => tile_channels(raw, norm)?,
        };
        Dataset::for_framework(self.framework, images, raw.labels.clone())
    }
}

/// Channel-first output; a single plane is repeated three times.
fn repeat_channels(raw: &RawImages, norm: Normalization) -> Result<Images> {
    let ImageShape { channels, height, width } = raw.shape;
    let plane = height * width;
    let copies = broadcast_factor(channels)?;
    let mut out = Vec::with_capacity(raw.pixels.len() * copies);
    for sample in raw.pixels.chunks_exact(channels * plane) {
        let normalized: Vec<f32> = sample.iter().map(|&p| norm.apply(p)).collect();
        for _ in 0..copies {
            out.extend_from_slice(&normalized);
        }
    }
    Images::new(Layout::ChannelsFirst, raw.len(), ImageShape::new(channels * copies, height, width), out)
}

/// Channel-last output; each grayscale pixel is tiled along the last axis.
fn tile_channels(raw: &RawImages, norm: Normalization) -> Result<Images> {
    let ImageShape { channels, height, width } = raw.shape;
    let copies = broadcast_factor(channels)?;
    let last = Images::new(
        Layout::ChannelsFirst,
        raw.len(),
        raw.shape,
        raw.pixels.iter().map(|&p| norm.apply(p)).collect(),
    )?
    .to_layout(Layout::ChannelsLast);

    let n = raw.shape.len();
    let mut out = Vec::with_capacity(n * copies * raw.len());
    for s in 0..last.len() {
        for pixel in last.sample(s).chunks_exact(channels) {
            for _ in 0..copies {
                out.extend_from_slice(pixel);
            }
        }
    }
    Images::new(Layout::ChannelsLast, raw.len(), ImageShape::new(channels * copies, height, width), out)
}

fn broadcast_factor(channels: usize) -> Result<usize> {
    match channels {
        1 => Ok(3),
        3 => Ok(1),
        other => Err(BenchError::dataset(format!("expected 1 or 3 channels, got {}", other))),
    }
}

impl<S: ImageSource> DatasetSource for MultiFrameworkDataset<S> {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn framework(&self) -> Framework {
        self.framework
    }

    fn get_data(&self) -> Result<(DataKind, DatasetPayload)> {
        let (train, test) = self.source.load()?;
        if train.shape != test.shape {
            return Err(BenchError::dataset(format!(
                "{}: train images are {:?} but test images are {:?}",
                self.source.name(), train.shape, test.shape
            )));
        }
        let description = DatasetDescription {
            n_samples_train: train.len(),
            n_samples_test: test.len(),
            image_width: train.shape.width,
            n_classes: self.source.n_classes(),
        };
        debug!(dataset = self.source.name(), framework = %self.framework, ?description, "prepared dataset");
        Ok((
            DataKind::Object,
            DatasetPayload {
                dataset: self.prepare(&train)?,
                test_dataset: self.prepare(&test)?,
                framework: self.framework,
                description,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Fixed;

    impl ImageSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn n_classes(&self) -> usize {
            2
        }

        fn normalization(&self) -> Normalization {
            Normalization { mean: 0.5, std: 0.25 }
        }

        fn load(&self) -> Result<(RawImages, RawImages)> {
            let shape = ImageShape::new(1, 2, 2);
            let train = RawImages { shape, pixels: vec![0, 51, 102, 255, 10, 20, 30, 40], labels: vec![0, 1] };
            let test = RawImages { shape, pixels: vec![255, 0, 0, 255], labels: vec![1] };
            Ok((train, test))
        }
    }

    #[test]
    fn engines_see_the_same_values() {
        let (_, a) = MultiFrameworkDataset::new(Fixed, Framework::Imperative).get_data().unwrap();
        let (_, b) = MultiFrameworkDataset::new(Fixed, Framework::Graph).get_data().unwrap();
        assert_eq!(a.description, b.description);
        assert_eq!(a.dataset.shape(), ImageShape::new(3, 2, 2));
        assert_eq!(a.dataset.images().to_layout(Layout::ChannelsLast), *b.dataset.images());
        for i in 0..2 {
            let (ma, mb) = (a.dataset.images().channel_means(i), b.dataset.images().channel_means(i));
            for (x, y) in ma.iter().zip(&mb) {
                assert_relative_eq!(x, y, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn normalization_scales_then_shifts() {
        let norm = Normalization { mean: 0.5, std: 0.25 };
        assert_relative_eq!(norm.apply(255), 2.0);
        assert_relative_eq!(norm.apply(0), -2.0);
    }
}

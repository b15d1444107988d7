//! Per-sample augmentation for the imperative engine.
//!
//! Transforms run at the dataset boundary, on channel-first samples, one
//! channel plane at a time through `image`'s geometric operations.

use std::sync::Arc;

use image::{imageops, ImageBuffer, Luma};
use rand::rngs::StdRng;
use rand::Rng;

use crate::data::images::ImageShape;
use crate::data::tensor_dataset::MapDataset;

type Plane = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Zero padding used by [`standard_augmentation`].
pub const CROP_PADDING: u32 = 4;

pub trait Transform: Send + Sync {
    /// Rewrites `sample` (channel-first, `shape`) in place.
    fn apply(&self, sample: &mut [f32], shape: ImageShape, rng: &mut StdRng);
}

/// Zero-pads every side by `padding`, then crops back to the original size
/// at a random offset. The offset is shared by all channels.
#[derive(Debug, Clone, Copy)]
pub struct RandomCrop {
    pub padding: u32,
}

impl Transform for RandomCrop {
    fn apply(&self, sample: &mut [f32], shape: ImageShape, rng: &mut StdRng) {
        let (w, h) = (shape.width as u32, shape.height as u32);
        let x = rng.gen_range(0..=2 * self.padding);
        let y = rng.gen_range(0..=2 * self.padding);

        for plane in sample.chunks_exact_mut(shape.width * shape.height) {
            let Some(image) = Plane::from_raw(w, h, plane.to_vec()) else {
                return;
            };
            let mut padded = Plane::new(w + 2 * self.padding, h + 2 * self.padding);
            imageops::replace(&mut padded, &image, self.padding as i64, self.padding as i64);
            let cropped = imageops::crop_imm(&padded, x, y, w, h).to_image();
            plane.copy_from_slice(cropped.as_raw());
        }
    }
}

/// Mirrors the image left-right with probability `p`.
#[derive(Debug, Clone, Copy)]
pub struct RandomHorizontalFlip {
    pub p: f64,
}

impl Default for RandomHorizontalFlip {
    fn default() -> Self {
        RandomHorizontalFlip { p: 0.5 }
    }
}

impl Transform for RandomHorizontalFlip {
    fn apply(&self, sample: &mut [f32], shape: ImageShape, rng: &mut StdRng) {
        if !rng.gen_bool(self.p) {
            return;
        }
        let (w, h) = (shape.width as u32, shape.height as u32);
        for plane in sample.chunks_exact_mut(shape.width * shape.height) {
            let Some(image) = Plane::from_raw(w, h, plane.to_vec()) else {
                return;
            };
            plane.copy_from_slice(imageops::flip_horizontal(&image).as_raw());
        }
    }
}

/// Applies transforms in order.
pub struct Compose(pub Vec<Box<dyn Transform>>);

impl Transform for Compose {
    fn apply(&self, sample: &mut [f32], shape: ImageShape, rng: &mut StdRng) {
        for transform in &self.0 {
            transform.apply(sample, shape, rng);
        }
    }
}

/// Random crop with 4 pixels of padding followed by a random horizontal flip.
pub fn standard_augmentation() -> Compose {
    Compose(vec![
        Box::new(RandomCrop { padding: CROP_PADDING }),
        Box::new(RandomHorizontalFlip::default()),
    ])
}

/// Wraps a dataset so that every fetched sample goes through `transform`.
pub struct AugmentedDataset<D> {
    inner: D,
    transform: Arc<dyn Transform>,
}

impl<D: MapDataset> AugmentedDataset<D> {
    pub fn new(inner: D, transform: Arc<dyn Transform>) -> AugmentedDataset<D> {
        AugmentedDataset { inner, transform }
    }
}

impl<D: MapDataset> MapDataset for AugmentedDataset<D> {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn shape(&self) -> ImageShape {
        self.inner.shape()
    }

    fn get(&self, index: usize, rng: &mut StdRng) -> (Vec<f32>, usize) {
        let (mut features, label) = self.inner.get(index, rng);
        self.transform.apply(&mut features, self.inner.shape(), rng);
        (features, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn ramp(shape: ImageShape) -> Vec<f32> {
        (0..shape.len()).map(|x| x as f32 + 1.0).collect()
    }

    #[test]
    fn certain_flip_mirrors_each_row() {
        let shape = ImageShape::new(2, 2, 3);
        let mut sample = ramp(shape);
        RandomHorizontalFlip { p: 1.0 }.apply(&mut sample, shape, &mut StdRng::seed_from_u64(0));
        assert_eq!(&sample[..6], &[3.0, 2.0, 1.0, 6.0, 5.0, 4.0]);
        assert_eq!(&sample[6..], &[9.0, 8.0, 7.0, 12.0, 11.0, 10.0]);
    }

    #[test]
    fn crop_keeps_shape_and_only_adds_zero_padding() {
        let shape = ImageShape::new(3, 8, 8);
        let original = ramp(shape);
        let mut sample = original.clone();
        RandomCrop { padding: 4 }.apply(&mut sample, shape, &mut StdRng::seed_from_u64(11));
        assert_eq!(sample.len(), original.len());
        assert!(sample.iter().all(|v| *v == 0.0 || original.contains(v)));
    }

    #[test]
    fn zero_padding_crop_is_identity() {
        let shape = ImageShape::new(1, 4, 4);
        let original = ramp(shape);
        let mut sample = original.clone();
        RandomCrop { padding: 0 }.apply(&mut sample, shape, &mut StdRng::seed_from_u64(3));
        assert_eq!(sample, original);
    }
}

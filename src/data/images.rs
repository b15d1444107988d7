use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Memory order of the channel axis within one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// `[C, H, W]` per sample.
    ChannelsFirst,
    /// `[H, W, C]` per sample.
    ChannelsLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ImageShape {
    pub fn new(channels: usize, height: usize, width: usize) -> ImageShape {
        ImageShape { channels, height, width }
    }

    /// Scalars per sample.
    pub fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat offset of `(c, h, w)` inside one sample stored in `layout`.
    #[inline]
    pub fn offset(&self, layout: Layout, c: usize, h: usize, w: usize) -> usize {
        match layout {
            Layout::ChannelsFirst => (c * self.height + h) * self.width + w,
            Layout::ChannelsLast => (h * self.width + w) * self.channels + c,
        }
    }
}

/// A batch of `f32` images sharing one shape and layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Images {
    layout: Layout,
    shape: ImageShape,
    count: usize,
    data: Arc<[f32]>,
}

impl Images {
    pub fn new(layout: Layout, count: usize, shape: ImageShape, data: Vec<f32>) -> Result<Images> {
        if data.len() != count * shape.len() {
            return Err(BenchError::dataset(format!(
                "image buffer holds {} values but {} samples of {}x{}x{} need {}",
                data.len(), count, shape.channels, shape.height, shape.width,
                count * shape.len()
            )));
        }
        Ok(Images { layout, shape, count, data: data.into() })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    pub fn sample(&self, index: usize) -> &[f32] {
        let n = self.shape.len();
        &self.data[index * n..(index + 1) * n]
    }

    /// Splits into the first `n` samples and the rest.
    pub fn split_at(&self, n: usize) -> (Images, Images) {
        let n = n.min(self.count);
        let cut = n * self.shape.len();
        let head = Images { count: n, data: self.data[..cut].into(), ..self.clone() };
        let tail = Images { count: self.count - n, data: self.data[cut..].into(), ..self.clone() };
        (head, tail)
    }

    /// Same numbers, re-ordered into `layout`.
    pub fn to_layout(&self, layout: Layout) -> Images {
        if layout == self.layout {
            return self.clone();
        }
        let ImageShape { channels, height, width } = self.shape;
        let n = self.shape.len();
        let mut out = vec![0.0f32; self.data.len()];
        for s in 0..self.count {
            let src = self.sample(s);
            let dst = &mut out[s * n..(s + 1) * n];
            for c in 0..channels {
                for h in 0..height {
                    for w in 0..width {
                        dst[self.shape.offset(layout, c, h, w)] = src[self.shape.offset(self.layout, c, h, w)];
                    }
                }
            }
        }
        Images { layout, data: out.into(), ..self.clone() }
    }

    /// Mean value of every channel of sample `index`.
    pub fn channel_means(&self, index: usize) -> Vec<f64> {
        let ImageShape { channels, height, width } = self.shape;
        let sample = self.sample(index);
        (0..channels)
            .map(|c| {
                let mut sum = 0.0f64;
                for h in 0..height {
                    for w in 0..width {
                        sum += sample[self.shape.offset(self.layout, c, h, w)] as f64;
                    }
                }
                sum / (height * width) as f64
            })
            .collect()
    }
}

/// Undecoded 8-bit images, channel-first, as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImages {
    pub shape: ImageShape,
    pub pixels: Vec<u8>,
    pub labels: Vec<usize>,
}

impl RawImages {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(layout: Layout) -> Images {
        let shape = ImageShape::new(3, 2, 2);
        Images::new(layout, 2, shape, (0..24).map(|x| x as f32).collect()).unwrap()
    }

    #[test]
    fn layout_round_trip_restores_data() {
        let first = counting(Layout::ChannelsFirst);
        let last = first.to_layout(Layout::ChannelsLast);
        // pixel (h=0, w=1) of channel 2 in sample 1
        assert_eq!(last.sample(1)[5], first.sample(1)[9]);
        assert_eq!(first.shape().offset(Layout::ChannelsLast, 2, 0, 1), 5);
        assert_eq!(last.to_layout(Layout::ChannelsFirst), first);
    }

    #[test]
    fn channel_means_ignore_layout() {
        let first = counting(Layout::ChannelsFirst);
        let last = first.to_layout(Layout::ChannelsLast);
        assert_eq!(first.channel_means(0), last.channel_means(0));
        assert_eq!(first.channel_means(0), vec![1.5, 5.5, 9.5]);
    }

    #[test]
    fn mismatched_buffer_is_a_dataset_error() {
        let err = Images::new(Layout::ChannelsFirst, 2, ImageShape::new(1, 2, 2), vec![0.0; 7]);
        assert!(matches!(err, Err(BenchError::Dataset(_))));
    }

    #[test]
    fn split_keeps_order() {
        let (head, tail) = counting(Layout::ChannelsFirst).split_at(1);
        assert_eq!(head.len(), 1);
        assert_eq!(tail.sample(0)[0], 12.0);
    }
}

use std::path::{Path, PathBuf};

use crate::data::idx::read_idx_pair;
use crate::data::images::RawImages;
use crate::datasets::multi_framework::{ImageSource, MultiFrameworkDataset, Normalization};
use crate::datasets::Framework;
use crate::error::Result;

pub const MNIST_MEAN: f32 = 0.1307;
pub const MNIST_STD: f32 = 0.3081;
pub const MNIST_CLASSES: usize = 10;

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
pub const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

/// The four uncompressed MNIST IDX files inside `root`.
#[derive(Debug, Clone, PartialEq)]
pub struct MnistFiles {
    pub root: PathBuf,
}

impl ImageSource for MnistFiles {
    fn name(&self) -> &str {
        "MNIST"
    }

    fn n_classes(&self) -> usize {
        MNIST_CLASSES
    }

    fn normalization(&self) -> Normalization {
        Normalization { mean: MNIST_MEAN, std: MNIST_STD }
    }

    fn load(&self) -> Result<(RawImages, RawImages)> {
        let train = read_idx_pair(&self.root.join(TRAIN_IMAGES), &self.root.join(TRAIN_LABELS), MNIST_CLASSES)?;
        let test = read_idx_pair(&self.root.join(TEST_IMAGES), &self.root.join(TEST_LABELS), MNIST_CLASSES)?;
        Ok((train, test))
    }
}

pub type MnistDataset = MultiFrameworkDataset<MnistFiles>;

impl MnistDataset {
    pub fn from_dir(root: impl AsRef<Path>, framework: Framework) -> MnistDataset {
        MultiFrameworkDataset::new(MnistFiles { root: root.as_ref().to_path_buf() }, framework)
    }
}

//! Datasets that serve either training engine with equivalent data.
//!
//! [`DatasetSource::get_data`] returns the training and test containers in
//! the native form of the selected [`Framework`] together with a
//! [`DatasetDescription`] that does not depend on the framework.

pub mod mnist;
pub mod multi_framework;
pub mod simulated;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::images::{ImageShape, Images};
use crate::data::slice_dataset::SliceDataset;
use crate::data::tensor_dataset::{MapDataset, TensorDataset};
use crate::error::{BenchError, Result};

pub use mnist::{MnistDataset, MnistFiles};
pub use multi_framework::{ImageSource, MultiFrameworkDataset, Normalization};
pub use simulated::SimulatedDataset;

/// Training engine a dataset is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Framework {
    /// Eager engine consuming indexable channel-first tensors.
    Imperative,
    /// Compiled-step engine consuming channel-last slice pipelines.
    Graph,
}

impl Framework {
    pub const ALL: [Framework; 2] = [Framework::Imperative, Framework::Graph];

    pub fn as_str(self) -> &'static str {
        match self {
            Framework::Imperative => "imperative",
            Framework::Graph => "graph",
        }
    }
}

impl FromStr for Framework {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Framework> {
        match s {
            "imperative" | "pytorch" => Ok(Framework::Imperative),
            "graph" | "tensorflow" => Ok(Framework::Graph),
            other => Err(BenchError::UnsupportedFramework(other.to_owned())),
        }
    }
}

impl TryFrom<String> for Framework {
    type Error = BenchError;

    fn try_from(value: String) -> Result<Framework> {
        value.parse()
    }
}

impl From<Framework> for String {
    fn from(framework: Framework) -> String {
        framework.as_str().to_owned()
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind tag returned next to the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescription {
    pub n_samples_train: usize,
    pub n_samples_test: usize,
    pub image_width: usize,
    pub n_classes: usize,
}

/// An engine-native dataset container.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Tensor(TensorDataset),
    Slices(SliceDataset),
}

impl Dataset {
    /// Engine the container is native to.
    pub fn framework(&self) -> Framework {
        match self {
            Dataset::Tensor(_) => Framework::Imperative,
            Dataset::Slices(_) => Framework::Graph,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Dataset::Tensor(ds) => MapDataset::len(ds),
            Dataset::Slices(ds) => ds.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> ImageShape {
        self.images().shape()
    }

    pub fn images(&self) -> &Images {
        match self {
            Dataset::Tensor(ds) => ds.images(),
            Dataset::Slices(ds) => ds.images(),
        }
    }

    pub fn labels(&self) -> &[usize] {
        match self {
            Dataset::Tensor(ds) => ds.labels(),
            Dataset::Slices(ds) => ds.labels(),
        }
    }

    /// Wraps channel-first `images` in the container native to `framework`.
    pub fn for_framework(framework: Framework, images: Images, labels: Vec<usize>) -> Result<Dataset> {
        match framework {
            Framework::Imperative => Ok(Dataset::Tensor(TensorDataset::new(images, labels)?)),
            Framework::Graph => Ok(Dataset::Slices(SliceDataset::from_tensor_slices(images, labels)?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetPayload {
    pub dataset: Dataset,
    pub test_dataset: Dataset,
    pub framework: Framework,
    pub description: DatasetDescription,
}

/// The dataset side of a benchmark pair.
pub trait DatasetSource {
    fn name(&self) -> &str;

    fn framework(&self) -> Framework;

    fn get_data(&self) -> Result<(DataKind, DatasetPayload)>;
}

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bench::RunOptions;
use crate::datasets::{DatasetSource, Framework, MnistDataset, SimulatedDataset};
use crate::solver::SolverGrid;

/// Where the benchmark data comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetConfig {
    Simulated(SimulatedDataset),
    /// Directory holding the four uncompressed MNIST IDX files.
    Mnist { root: PathBuf },
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig::Simulated(SimulatedDataset { n_samples: 128, img_size: 8, ..Default::default() })
    }
}

impl DatasetConfig {
    /// The dataset prepared for `framework`.
    pub fn for_framework(&self, framework: Framework) -> Box<dyn DatasetSource> {
        match self {
            DatasetConfig::Simulated(ds) => Box::new(SimulatedDataset { framework, ..ds.clone() }),
            DatasetConfig::Mnist { root } => Box::new(MnistDataset::from_dir(root, framework)),
        }
    }
}

/// A complete benchmark description: one dataset, any number of grids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub dataset: DatasetConfig,
    pub grids: Vec<SolverGrid>,
    pub run: RunOptions,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            dataset: DatasetConfig::default(),
            grids: vec![SolverGrid::sgd(Framework::Imperative), SolverGrid::sgd(Framework::Graph)],
            run: RunOptions { max_checkpoints: Some(50), ..Default::default() },
        }
    }
}

impl BenchConfig {
    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `BenchConfig` from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> crate::Result<BenchConfig> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Total number of solver configurations across all grids.
    pub fn n_configs(&self) -> usize {
        self.grids.iter().map(|g| g.expand().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_survives_a_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.json");
        let config = BenchConfig::default();
        config.save_json(&path).unwrap();
        assert_eq!(BenchConfig::load_json(&path).unwrap(), config);
    }

    #[test]
    fn dataset_follows_the_requested_framework() {
        let ds = DatasetConfig::default().for_framework(Framework::Graph);
        assert_eq!(ds.framework(), Framework::Graph);
        assert_eq!(ds.name(), "Simulated");
    }

    #[test]
    fn empty_object_is_the_default() {
        let config: BenchConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.n_configs(), 48);
    }
}

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::data::images::ImageShape;
use crate::data::tensor_dataset::MapDataset;
use crate::error::{BenchError, Result};

/// Upper bound on data-loading worker threads.
pub const MAX_WORKERS: usize = 10;

// ---------------------------------------------------------------------------
// Worker policy
// ---------------------------------------------------------------------------

/// Worker count for this host: `min(MAX_WORKERS, cpus)`, or zero where
/// background loading is unreliable.
///
/// The platform is read from `RUNNER_OS` when set (CI runners), otherwise
/// from the compile-time target OS.
pub fn default_worker_count() -> usize {
    let system = std::env::var("RUNNER_OS").unwrap_or_else(|_| std::env::consts::OS.to_owned());
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    worker_count_for(&system, cpus)
}

pub fn worker_count_for(system: &str, cpus: usize) -> usize {
    if background_workers_unreliable(system) {
        0
    } else {
        cpus.min(MAX_WORKERS)
    }
}

fn background_workers_unreliable(system: &str) -> bool {
    matches!(system, "Darwin" | "macOS" | "macos")
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Flattened features of `len()` samples plus their labels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    pub features: Vec<f32>,
    pub labels: Vec<usize>,
    pub sample_len: usize,
}

impl Batch {
    pub fn from_samples(samples: impl IntoIterator<Item = (Vec<f32>, usize)>, sample_len: usize) -> Batch {
        let mut batch = Batch { sample_len, ..Batch::default() };
        for (features, label) in samples {
            debug_assert_eq!(features.len(), sample_len);
            batch.features.extend_from_slice(&features);
            batch.labels.push(label);
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn sample(&self, index: usize) -> &[f32] {
        &self.features[index * self.sample_len..(index + 1) * self.sample_len]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[f32], usize)> + '_ {
        self.features.chunks_exact(self.sample_len.max(1)).zip(self.labels.iter().copied())
    }
}

// ---------------------------------------------------------------------------
// DataLoader
// ---------------------------------------------------------------------------

/// Mini-batch loader over a [`MapDataset`].
///
/// With `num_workers > 0` the samples of each batch are fetched on a
/// dedicated thread pool; with zero everything runs on the caller's thread.
/// Every sample gets its own generator seeded from `(seed, epoch, index)`,
/// so results do not depend on the worker count.
#[derive(Clone)]
pub struct DataLoader {
    dataset: Arc<dyn MapDataset>,
    batch_size: usize,
    seed: u64,
    pool: Option<Arc<ThreadPool>>,
}

impl DataLoader {
    pub fn new(dataset: Arc<dyn MapDataset>, batch_size: usize, num_workers: usize) -> Result<DataLoader> {
        if batch_size == 0 {
            return Err(BenchError::config("batch_size must be at least 1"));
        }
        let pool = if num_workers > 0 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(num_workers)
                .thread_name(|i| format!("data-loader-{i}"))
                .build()
                .map_err(|e| BenchError::resource(format!("cannot start {num_workers} loader workers: {e}")))?;
            Some(Arc::new(pool))
        } else {
            None
        };
        Ok(DataLoader { dataset, batch_size, seed: 0, pool })
    }

    pub fn with_seed(self, seed: u64) -> DataLoader {
        DataLoader { seed, ..self }
    }

    pub fn num_workers(&self) -> usize {
        self.pool.as_ref().map_or(0, |p| p.current_num_threads())
    }

    /// Shape of one sample.
    pub fn shape(&self) -> ImageShape {
        self.dataset.shape()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches per epoch.
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Batches of one pass over the dataset, in dataset order.
    pub fn epoch(&self, epoch: usize) -> EpochBatches<'_> {
        let order: Vec<usize> = (0..self.dataset.len()).collect();
        EpochBatches { loader: self, order, position: 0, epoch }
    }

    fn fetch(&self, epoch: usize, indices: &[usize]) -> Batch {
        let load = |&index: &usize| {
            let mut rng = StdRng::seed_from_u64(mix(self.seed, epoch as u64, index as u64));
            self.dataset.get(index, &mut rng)
        };
        let samples: Vec<(Vec<f32>, usize)> = match &self.pool {
            Some(pool) => pool.install(|| indices.par_iter().map(load).collect()),
            None => indices.iter().map(load).collect(),
        };
        Batch::from_samples(samples, self.dataset.shape().len())
    }
}

impl fmt::Debug for DataLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLoader")
            .field("len", &self.dataset.len())
            .field("batch_size", &self.batch_size)
            .field("num_workers", &self.num_workers())
            .finish()
    }
}

pub struct EpochBatches<'a> {
    loader: &'a DataLoader,
    order: Vec<usize>,
    position: usize,
    epoch: usize,
}

impl Iterator for EpochBatches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.position >= self.order.len() {
            return None;
        }
        let end = (self.position + self.loader.batch_size).min(self.order.len());
        let batch = self.loader.fetch(self.epoch, &self.order[self.position..end]);
        self.position = end;
        Some(batch)
    }
}

/// SplitMix-style combination of three words into one seed.
fn mix(seed: u64, epoch: u64, index: u64) -> u64 {
    let mut z = seed
        .wrapping_add(epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(index.wrapping_mul(0xD1B5_4A32_D192_ED03));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::augment::{AugmentedDataset, RandomHorizontalFlip};
    use crate::data::images::{ImageShape, Images, Layout};
    use crate::data::tensor_dataset::TensorDataset;

    fn dataset(n: usize) -> TensorDataset {
        let shape = ImageShape::new(1, 2, 2);
        let images = Images::new(Layout::ChannelsFirst, n, shape, (0..n * 4).map(|x| x as f32).collect()).unwrap();
        TensorDataset::new(images, (0..n).map(|i| i % 3).collect()).unwrap()
    }

    #[test]
    fn worker_policy_caps_and_disables_on_macos() {
        assert_eq!(worker_count_for("Linux", 64), MAX_WORKERS);
        assert_eq!(worker_count_for("linux", 4), 4);
        assert_eq!(worker_count_for("macOS", 64), 0);
        assert_eq!(worker_count_for("Darwin", 8), 0);
    }

    #[test]
    fn epoch_keeps_dataset_order() {
        let loader = DataLoader::new(Arc::new(dataset(5)), 2, 0).unwrap();
        assert_eq!(loader.len(), 3);
        let labels: Vec<usize> = loader.epoch(1).flat_map(|b| b.labels).collect();
        assert_eq!(labels, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn worker_pool_gives_the_same_batches() {
        let flip: Arc<dyn crate::data::augment::Transform> = Arc::new(RandomHorizontalFlip::default());
        let serial = DataLoader::new(Arc::new(AugmentedDataset::new(dataset(7), flip.clone())), 3, 0)
            .unwrap()
            .with_seed(5);
        let parallel = DataLoader::new(Arc::new(AugmentedDataset::new(dataset(7), flip)), 3, 2)
            .unwrap()
            .with_seed(5);
        assert_eq!(parallel.num_workers(), 2);
        let a: Vec<Batch> = serial.epoch(2).collect();
        let b: Vec<Batch> = parallel.epoch(2).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(matches!(DataLoader::new(Arc::new(dataset(2)), 0, 0), Err(BenchError::Config(_))));
    }
}

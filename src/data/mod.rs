pub mod augment;
pub mod idx;
pub mod images;
pub mod loader;
pub mod slice_dataset;
pub mod tensor_dataset;

pub use augment::{standard_augmentation, AugmentedDataset, Compose, RandomCrop, RandomHorizontalFlip, Transform};
pub use idx::{parse_idx_pair, read_idx_pair};
pub use images::{ImageShape, Images, Layout, RawImages};
pub use loader::{default_worker_count, worker_count_for, Batch, DataLoader, MAX_WORKERS};
pub use slice_dataset::SliceDataset;
pub use tensor_dataset::{MapDataset, TensorDataset};

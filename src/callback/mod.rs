pub mod progress;

pub use progress::{Callback, ObjectiveSample, ProgressCallback};

use serde::{Deserialize, Serialize};

/// Per-epoch training statistics recorded by both training loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Mean training loss over all samples in this epoch, measured during the
    /// pass.
    pub train_loss: f64,
    /// Learning rate the epoch's steps were taken with.
    pub learning_rate: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}

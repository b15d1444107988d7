//! Training loops driven by a [`Callback`] until it says stop.
//!
//! Both engines run epochs without a cap and hand the model to the callback
//! after every completed pass over the training set. The callback's decision
//! is checked as soon as it returns; nothing interrupts a pass in flight.

pub mod epoch_stats;
pub mod graph;
pub mod imperative;

use crate::callback::Callback;
use crate::error::Result;
use crate::objective::Classifier;

pub use epoch_stats::EpochStats;
pub use graph::{GraphLoop, GraphModel, GraphOptimizer, TrainStep};
pub use imperative::ImperativeLoop;

pub trait TrainingLoop {
    type Model: Classifier;

    fn model(&self) -> &Self::Model;

    fn into_model(self) -> Self::Model;

    /// Trains until `callback` returns `Stop`.
    fn run_until_stopped(&mut self, callback: &mut dyn Callback) -> Result<()>;

    fn epoch_stats(&self) -> &[EpochStats];
}

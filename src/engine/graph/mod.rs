//! The compiled-graph engine.
//!
//! A [`Network`](crate::network::Network) is compiled into a [`GraphModel`]
//! whose variables, together with the optimizer's slot variables, belong to
//! the engine. Each batch of a [`SliceDataset`] runs one [`TrainStep`]
//! followed by [`GraphOptimizer::apply_gradients`].

pub mod model;
pub mod optimizer;
pub mod step;

use std::time::Instant;

use tracing::{debug, info};

use crate::callback::Callback;
use crate::data::slice_dataset::SliceDataset;
use crate::engine::{EpochStats, TrainingLoop};
use crate::error::Result;

pub use model::{DenseNode, GraphModel, Variable};
pub use optimizer::GraphOptimizer;
pub use step::{StepOutput, TrainStep};

#[derive(Debug)]
pub struct GraphLoop {
    model: GraphModel,
    optimizer: GraphOptimizer,
    step: TrainStep,
    dataset: SliceDataset,
    batch_size: usize,
    epoch: usize,
    stats: Vec<EpochStats>,
}

impl GraphLoop {
    /// Binds the pieces; no training happens here.
    pub fn configure(
        model: GraphModel,
        optimizer: GraphOptimizer,
        step: TrainStep,
        dataset: SliceDataset,
        batch_size: usize,
    ) -> GraphLoop {
        GraphLoop { model, optimizer, step, dataset, batch_size, epoch: 0, stats: Vec::new() }
    }

    fn run_epoch(&mut self) -> EpochStats {
        let start = Instant::now();
        let learning_rate = self.optimizer.current_learning_rate();
        let mut total_loss = 0.0;
        let mut seen = 0usize;

        for batch in self.dataset.batch(self.batch_size) {
            let StepOutput { gradients, loss } = self.step.gradients(&self.model, &batch);
            self.optimizer.apply_gradients(self.model.variables_mut(), &gradients);
            total_loss += loss * batch.len() as f64;
            seen += batch.len();
        }
        self.optimizer.end_epoch();
        self.epoch += 1;

        EpochStats {
            epoch: self.epoch,
            train_loss: total_loss / seen.max(1) as f64,
            learning_rate,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }
}

impl TrainingLoop for GraphLoop {
    type Model = GraphModel;

    fn model(&self) -> &GraphModel {
        &self.model
    }

    fn into_model(self) -> GraphModel {
        self.model
    }

    fn run_until_stopped(&mut self, callback: &mut dyn Callback) -> Result<()> {
        loop {
            let stats = self.run_epoch();
            debug!(epoch = stats.epoch, train_loss = stats.train_loss, lr = stats.learning_rate, "epoch done");
            self.stats.push(stats);

            if callback.checkpoint(&self.model)?.is_stop() {
                info!(epochs = self.epoch, steps = self.optimizer.iterations(), "graph loop stopped");
                return Ok(());
            }
        }
    }

    fn epoch_stats(&self) -> &[EpochStats] {
        &self.stats
    }
}

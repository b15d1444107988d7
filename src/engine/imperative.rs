use std::time::Instant;

use tracing::{debug, info};

use crate::callback::Callback;
use crate::data::loader::DataLoader;
use crate::engine::{EpochStats, TrainingLoop};
use crate::error::Result;
use crate::network::network::Network;
use crate::optim::optimizer::OptimizerBinding;

/// Eager epoch loop: batches from a [`DataLoader`], forward, backward and
/// update through [`Network::training_step`], scheduler stepped per epoch.
#[derive(Debug)]
pub struct ImperativeLoop {
    network: Network,
    binding: OptimizerBinding,
    loader: DataLoader,
    epoch: usize,
    stats: Vec<EpochStats>,
}

impl ImperativeLoop {
    /// Binds the pieces; no training happens here.
    pub fn configure(network: Network, binding: OptimizerBinding, loader: DataLoader) -> ImperativeLoop {
        ImperativeLoop { network, binding, loader, epoch: 0, stats: Vec::new() }
    }

    fn run_epoch(&mut self) -> EpochStats {
        let start = Instant::now();
        let learning_rate = self.binding.optimizer.learning_rate();
        let mut total_loss = 0.0;
        let mut seen = 0usize;

        for batch in self.loader.epoch(self.epoch) {
            let loss = self.network.training_step(&batch, &mut self.binding.optimizer);
            total_loss += loss * batch.len() as f64;
            seen += batch.len();
        }
        self.binding.end_epoch();
        self.epoch += 1;

        EpochStats {
            epoch: self.epoch,
            train_loss: total_loss / seen.max(1) as f64,
            learning_rate,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }
}

impl TrainingLoop for ImperativeLoop {
    type Model = Network;

    fn model(&self) -> &Network {
        &self.network
    }

    fn into_model(self) -> Network {
        self.network
    }

    fn run_until_stopped(&mut self, callback: &mut dyn Callback) -> Result<()> {
        loop {
            let stats = self.run_epoch();
            debug!(epoch = stats.epoch, train_loss = stats.train_loss, lr = stats.learning_rate, "epoch done");
            self.stats.push(stats);

            if callback.checkpoint(&self.network)?.is_stop() {
                info!(epochs = self.epoch, "imperative loop stopped");
                return Ok(());
            }
        }
    }

    fn epoch_stats(&self) -> &[EpochStats] {
        &self.stats
    }
}

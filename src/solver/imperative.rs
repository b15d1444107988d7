use std::sync::Arc;

use tracing::{info, warn};

use crate::callback::Callback;
use crate::data::augment::{standard_augmentation, AugmentedDataset};
use crate::data::loader::{default_worker_count, DataLoader};
use crate::data::tensor_dataset::MapDataset;
use crate::datasets::Dataset;
use crate::engine::{EpochStats, ImperativeLoop, TrainingLoop};
use crate::error::{BenchError, Result};
use crate::network::network::Network;
use crate::objective::Classifier;
use crate::optim::optimizer::{Optimizer, OptimizerBinding};
use crate::optim::schedule::LrSchedule;
use crate::solver::config::{SolverConfig, BOTH_DECAYS};
use crate::solver::{common_skip, ModelInitFn, Skip, Solver};

/// Solver running on the imperative engine.
pub struct ImperativeSolver {
    config: SolverConfig,
    model_init_fn: Option<ModelInitFn>,
    loader: Option<DataLoader>,
    model: Option<Network>,
    stats: Vec<EpochStats>,
}

impl ImperativeSolver {
    pub fn new(config: SolverConfig) -> ImperativeSolver {
        ImperativeSolver { config, model_init_fn: None, loader: None, model: None, stats: Vec::new() }
    }

    pub fn model(&self) -> Option<&Network> {
        self.model.as_ref()
    }

    fn binding(&self) -> Result<OptimizerBinding> {
        let params = self.config.optimizer;
        let weight_decay = params.weight_decay().ok_or_else(|| BenchError::config(BOTH_DECAYS))?;
        let optimizer = Optimizer::new(params.rule(), params.learning_rate(), weight_decay);
        Ok(OptimizerBinding::new(optimizer, LrSchedule::from_kind(self.config.base.lr_schedule)))
    }
}

impl Solver for ImperativeSolver {
    fn name(&self) -> String {
        self.config.name()
    }

    fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn skip(&self, _model_init_fn: &ModelInitFn, dataset: &Dataset) -> Skip {
        let skip = common_skip(&self.config, dataset);
        if let Skip::Yes(reason) = &skip {
            warn!(solver = %self.name(), reason = %reason, "skipping");
        }
        skip
    }

    fn set_objective(&mut self, model_init_fn: ModelInitFn, dataset: Dataset) -> Result<()> {
        let Dataset::Tensor(tensors) = dataset else {
            return Err(BenchError::config(format!("{} needs an imperative-engine dataset", self.name())));
        };
        let dataset: Arc<dyn MapDataset> = if self.config.base.data_aug {
            Arc::new(AugmentedDataset::new(tensors, Arc::new(standard_augmentation())))
        } else {
            Arc::new(tensors)
        };
        let workers = self.config.num_workers.unwrap_or_else(default_worker_count);
        let loader = DataLoader::new(dataset, self.config.base.batch_size, workers)?.with_seed(self.config.seed);

        self.model_init_fn = Some(model_init_fn);
        self.loader = Some(loader);
        Ok(())
    }

    fn run(&mut self, callback: &mut dyn Callback) -> Result<()> {
        let (Some(init), Some(loader)) = (self.model_init_fn.clone(), self.loader.clone()) else {
            return Err(BenchError::NotConfigured(self.name()));
        };
        self.model = None;
        self.stats.clear();

        let network = init();
        network.check_input(loader.shape())?;
        let binding = self.binding()?;
        info!(solver = %self.name(), workers = loader.num_workers(), "run started");

        if callback.checkpoint(&network)?.is_stop() {
            self.model = Some(network);
            return Ok(());
        }

        let mut training = ImperativeLoop::configure(network, binding, loader);
        training.run_until_stopped(callback)?;
        self.stats = training.epoch_stats().to_vec();
        self.model = Some(training.into_model());
        Ok(())
    }

    fn get_result(&self) -> Option<&dyn Classifier> {
        self.model.as_ref().map(|m| m as &dyn Classifier)
    }

    fn epoch_stats(&self) -> &[EpochStats] {
        &self.stats
    }
}

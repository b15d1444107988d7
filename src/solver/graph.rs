use tracing::{info, warn};

use crate::callback::Callback;
use crate::data::slice_dataset::SliceDataset;
use crate::datasets::Dataset;
use crate::engine::{EpochStats, GraphLoop, GraphModel, GraphOptimizer, TrainStep, TrainingLoop};
use crate::error::{BenchError, Result};
use crate::objective::Classifier;
use crate::optim::schedule::LrSchedule;
use crate::solver::config::{SolverConfig, BOTH_DECAYS};
use crate::solver::{common_skip, ModelInitFn, Skip, Solver};

/// Solver running on the graph engine.
///
/// Hyperparameters are translated into engine-native form at run time:
/// coupled decay `wd` becomes an L2 penalty `wd / 2` on the loss, and
/// decoupled decay is handed to the optimizer as `lr * wd`.
pub struct GraphSolver {
    config: SolverConfig,
    model_init_fn: Option<ModelInitFn>,
    dataset: Option<SliceDataset>,
    model: Option<GraphModel>,
    stats: Vec<EpochStats>,
}

impl GraphSolver {
    pub fn new(config: SolverConfig) -> GraphSolver {
        GraphSolver { config, model_init_fn: None, dataset: None, model: None, stats: Vec::new() }
    }

    pub fn model(&self) -> Option<&GraphModel> {
        self.model.as_ref()
    }

    fn engine_parts(&self) -> Result<(GraphOptimizer, TrainStep)> {
        let params = self.config.optimizer;
        let (coupled, decoupled) = params.weight_decays();
        if coupled != 0.0 && decoupled != 0.0 {
            return Err(BenchError::config(BOTH_DECAYS));
        }
        let lr = params.learning_rate();
        let optimizer = GraphOptimizer::new(params.rule(), lr)
            .with_decay(lr * decoupled)
            .with_schedule(LrSchedule::from_kind(self.config.base.lr_schedule));
        Ok((optimizer, TrainStep::new(coupled / 2.0)))
    }
}

impl Solver for GraphSolver {
    fn name(&self) -> String {
        self.config.name()
    }

    fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn skip(&self, _model_init_fn: &ModelInitFn, dataset: &Dataset) -> Skip {
        let mut skip = common_skip(&self.config, dataset);
        if !skip.is_skip() && self.config.base.data_aug {
            skip = Skip::Yes("Data augmentation is not supported by the graph engine".to_owned());
        }
        if let Skip::Yes(reason) = &skip {
            warn!(solver = %self.name(), reason = %reason, "skipping");
        }
        skip
    }

    fn set_objective(&mut self, model_init_fn: ModelInitFn, dataset: Dataset) -> Result<()> {
        let dataset = match dataset {
            Dataset::Slices(slices) => slices,
            Dataset::Tensor(tensors) => {
                SliceDataset::from_tensor_slices(tensors.images().clone(), tensors.labels().to_vec())?
            }
        };
        if self.config.base.batch_size == 0 {
            return Err(BenchError::config("batch_size must be at least 1"));
        }
        self.model_init_fn = Some(model_init_fn);
        self.dataset = Some(dataset);
        Ok(())
    }

    fn run(&mut self, callback: &mut dyn Callback) -> Result<()> {
        let (Some(init), Some(dataset)) = (self.model_init_fn.clone(), self.dataset.clone()) else {
            return Err(BenchError::NotConfigured(self.name()));
        };
        self.model = None;
        self.stats.clear();

        let model = GraphModel::compile(&init(), dataset.shape())?;
        let (optimizer, step) = self.engine_parts()?;
        info!(solver = %self.name(), variables = model.variables().len(), "run started");

        if callback.checkpoint(&model)?.is_stop() {
            self.model = Some(model);
            return Ok(());
        }

        let mut training = GraphLoop::configure(model, optimizer, step, dataset, self.config.base.batch_size);
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

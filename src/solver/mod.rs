//! Solvers: one optimizer configuration bound to one training engine.
//!
//! A harness asks [`Solver::skip`] first, then calls
//! [`Solver::set_objective`], [`Solver::run`] and finally
//! [`Solver::get_result`].

pub mod config;
pub mod graph;
pub mod imperative;

use std::sync::Arc;

use crate::callback::Callback;
use crate::datasets::{Dataset, Framework};
use crate::engine::EpochStats;
use crate::error::Result;
use crate::network::network::Network;
use crate::objective::Classifier;
use crate::stopping::SufficientProgressCriterion;

pub use config::{
    BaseGrid, BaseParams, OptimizerGrid, OptimizerParams, RmsPropGrid, SgdGrid, SolverConfig, SolverGrid,
};
pub use graph::GraphSolver;
pub use imperative::ImperativeSolver;

/// Builds a fresh, deterministic model on every call.
pub type ModelInitFn = Arc<dyn Fn() -> Network + Send + Sync>;

/// Outcome of [`Solver::skip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    No,
    Yes(String),
}

impl Skip {
    pub fn is_skip(&self) -> bool {
        matches!(self, Skip::Yes(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Skip::No => None,
            Skip::Yes(reason) => Some(reason),
        }
    }
}

pub trait Solver: Send {
    fn name(&self) -> String;

    fn config(&self) -> &SolverConfig;

    fn stopping_criterion(&self) -> SufficientProgressCriterion {
        self.config().stopping
    }

    /// Whether this solver cannot run on `dataset`. Never fails.
    fn skip(&self, model_init_fn: &ModelInitFn, dataset: &Dataset) -> Skip;

    /// Stores the model factory and prepares the data pipeline.
    fn set_objective(&mut self, model_init_fn: ModelInitFn, dataset: Dataset) -> Result<()>;

    /// Trains a fresh model until `callback` says stop. The callback first
    /// sees the untrained model.
    fn run(&mut self, callback: &mut dyn Callback) -> Result<()>;

    /// The model of the last finished run.
    fn get_result(&self) -> Option<&dyn Classifier>;

    fn epoch_stats(&self) -> &[EpochStats];
}

/// The solver implementation for `config.engine`.
pub fn build_solver(config: SolverConfig) -> Box<dyn Solver> {
    match config.engine {
        Framework::Imperative => Box::new(ImperativeSolver::new(config)),
        Framework::Graph => Box::new(GraphSolver::new(config)),
    }
}

/// Reasons shared by both engines.
fn common_skip(config: &SolverConfig, dataset: &Dataset) -> Skip {
    if dataset.framework() != config.engine {
        return Skip::Yes(format!("Not a {} dataset", config.engine));
    }
    if config.optimizer.weight_decay().is_none() {
        return Skip::Yes(config::BOTH_DECAYS.to_owned());
    }
    Skip::No
}

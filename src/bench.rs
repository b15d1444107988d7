//! Runs one solver against one dataset and reports the objective history.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::callback::{ObjectiveSample, ProgressCallback};
use crate::datasets::{DatasetDescription, DatasetPayload, DatasetSource, Framework};
use crate::engine::EpochStats;
use crate::error::Result;
use crate::network::spec::NetworkSpec;
use crate::objective::ClassificationObjective;
use crate::solver::{ModelInitFn, Skip, Solver};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Hidden units of the default classifier.
    pub hidden_units: usize,
    pub model_seed: u64,
    /// Stop after this many checkpoints even while still improving.
    pub max_checkpoints: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions { hidden_units: 32, model_seed: 0, max_checkpoints: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Skipped { reason: String },
    Completed {
        best_checkpoint: Option<usize>,
        best_value: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub solver: String,
    pub dataset: String,
    pub framework: Framework,
    pub description: DatasetDescription,
    #[serde(flatten)]
    pub status: RunStatus,
    pub history: Vec<ObjectiveSample>,
    pub epochs: Vec<EpochStats>,
}

impl RunReport {
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, RunStatus::Skipped { .. })
    }
}

/// Fetches the dataset, builds the default classifier for it and runs the
/// solver.
pub fn run_pair(solver: &mut dyn Solver, source: &dyn DatasetSource, options: &RunOptions) -> Result<RunReport> {
    let (_, payload) = source.get_data()?;
    let model_init_fn = NetworkSpec::classifier(&payload.description, options.hidden_units)
        .model_init_fn(options.model_seed)?;
    run_with(solver, source.name(), payload, model_init_fn, options.max_checkpoints)
}

/// `skip`, `set_objective`, `run`, then collects the history.
pub fn run_with(
    solver: &mut dyn Solver,
    dataset_name: &str,
    payload: DatasetPayload,
    model_init_fn: ModelInitFn,
    max_checkpoints: Option<usize>,
) -> Result<RunReport> {
    let mut report = RunReport {
        solver: solver.name(),
        dataset: dataset_name.to_owned(),
        framework: payload.framework,
        description: payload.description,
        status: RunStatus::Completed { best_checkpoint: None, best_value: None },
        history: Vec::new(),
        epochs: Vec::new(),
    };

    if let Skip::Yes(reason) = solver.skip(&model_init_fn, &payload.dataset) {
        report.status = RunStatus::Skipped { reason };
        return Ok(report);
    }

    let evaluator = ClassificationObjective::from_payload(&payload)?;
    let mut callback =
        ProgressCallback::new(evaluator, &solver.stopping_criterion()).with_max_checkpoints(max_checkpoints);

    solver.set_objective(model_init_fn, payload.dataset)?;
    solver.run(&mut callback)?;

    let best = callback.state().best();
    report.status = RunStatus::Completed {
        best_checkpoint: best.map(|(index, _)| index),
        best_value: best.map(|(_, value)| value),
    };
    report.epochs = solver.epoch_stats().to_vec();
    report.history = callback.into_history();
    info!(
        solver = %report.solver,
        checkpoints = report.history.len(),
        best = ?best,
        "run finished"
    );
    Ok(report)
}

//! Solver parameters and the grids they are drawn from.
//!
//! A [`SolverGrid`] is the product of a [`BaseGrid`] shared by every solver
//! (batch size, augmentation, schedule) and an [`OptimizerGrid`] holding the
//! optimizer's own lists. Each combination becomes one [`SolverConfig`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::datasets::Framework;
use crate::optim::rmsprop::RmsProp;
use crate::optim::rule::{UpdateRule, WeightDecay};
use crate::optim::schedule::LrScheduleKind;
use crate::optim::sgd::Sgd;
use crate::stopping::SufficientProgressCriterion;

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Error message of contradictory weight-decay settings.
pub const BOTH_DECAYS: &str = "Cannot use both decoupled and coupled weight decay";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseParams {
    pub batch_size: usize,
    pub data_aug: bool,
    pub lr_schedule: LrScheduleKind,
}

impl Default for BaseParams {
    fn default() -> Self {
        BaseParams { batch_size: DEFAULT_BATCH_SIZE, data_aug: false, lr_schedule: LrScheduleKind::None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "optimizer", rename_all = "snake_case")]
pub enum OptimizerParams {
    Sgd(Sgd),
    #[serde(rename = "rmsprop")]
    RmsProp(RmsProp),
}

impl OptimizerParams {
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerParams::Sgd(_) => "SGD",
            OptimizerParams::RmsProp(_) => "RMSProp",
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            OptimizerParams::Sgd(p) => p.learning_rate,
            OptimizerParams::RmsProp(p) => p.learning_rate,
        }
    }

    pub fn rule(&self) -> UpdateRule {
        match self {
            OptimizerParams::Sgd(p) => p.rule(),
            OptimizerParams::RmsProp(p) => p.rule(),
        }
    }

    /// `(coupled, decoupled)`; SGD's `weight_decay` is coupled.
    pub fn weight_decays(&self) -> (f64, f64) {
        match self {
            OptimizerParams::Sgd(p) => (p.weight_decay, 0.0),
            OptimizerParams::RmsProp(p) => (p.coupled_weight_decay, p.decoupled_weight_decay),
        }
    }

    /// `None` when both kinds are set.
    pub fn weight_decay(&self) -> Option<WeightDecay> {
        let (coupled, decoupled) = self.weight_decays();
        WeightDecay::from_pair(coupled, decoupled)
    }
}

/// Hyperparameters as `key=value` pairs.
impl fmt::Display for OptimizerParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerParams::Sgd(p) => write!(
                f,
                "lr={},momentum={},nesterov={},weight_decay={}",
                p.learning_rate, p.momentum, p.nesterov, p.weight_decay
            ),
            OptimizerParams::RmsProp(p) => write!(
                f,
                "lr={},rho={},momentum={},coupled_weight_decay={},decoupled_weight_decay={}",
                p.learning_rate, p.rho, p.momentum, p.coupled_weight_decay, p.decoupled_weight_decay
            ),
        }
    }
}

/// One point of a grid: everything a solver instance needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub engine: Framework,
    #[serde(flatten)]
    pub base: BaseParams,
    #[serde(flatten)]
    pub optimizer: OptimizerParams,
    #[serde(default)]
    pub stopping: SufficientProgressCriterion,
    /// Loader workers; `None` picks the host default.
    #[serde(default)]
    pub num_workers: Option<usize>,
    /// Seeds augmentation.
    #[serde(default)]
    pub seed: u64,
}

impl SolverConfig {
    pub fn new(engine: Framework, base: BaseParams, optimizer: OptimizerParams) -> SolverConfig {
        SolverConfig {
            engine,
            base,
            optimizer,
            stopping: SufficientProgressCriterion::default(),
            num_workers: None,
            seed: 0,
        }
    }

    /// `"<optimizer>-<engine>[key=value,...]"`.
    pub fn name(&self) -> String {
        format!(
            "{}-{}[batch_size={},data_aug={},lr_schedule={},{}]",
            self.optimizer.name(), self.engine, self.base.batch_size, self.base.data_aug, self.base.lr_schedule,
            self.optimizer
        )
    }
}

// ---------------------------------------------------------------------------
// Grids
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseGrid {
    pub batch_size: Vec<usize>,
    pub data_aug: Vec<bool>,
    pub lr_schedule: Vec<LrScheduleKind>,
}

impl Default for BaseGrid {
    fn default() -> Self {
        BaseGrid {
            batch_size: vec![DEFAULT_BATCH_SIZE],
            data_aug: vec![false, true],
            lr_schedule: vec![LrScheduleKind::None, LrScheduleKind::Step, LrScheduleKind::Cosine],
        }
    }
}

impl BaseGrid {
    pub fn len(&self) -> usize {
        self.batch_size.len() * self.data_aug.len() * self.lr_schedule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn expand(&self) -> Vec<BaseParams> {
        let mut out = Vec::with_capacity(self.len());
        for &batch_size in &self.batch_size {
            for &data_aug in &self.data_aug {
                for &lr_schedule in &self.lr_schedule {
                    out.push(BaseParams { batch_size, data_aug, lr_schedule });
                }
            }
        }
        out
    }
}

/// `(nesterov, momentum)` pairs are listed jointly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdGrid {
    pub nesterov_momentum: Vec<(bool, f64)>,
    pub lr: Vec<f64>,
    pub weight_decay: Vec<f64>,
}

impl Default for SgdGrid {
    fn default() -> Self {
        SgdGrid {
            nesterov_momentum: vec![(false, 0.0), (true, 0.9)],
            lr: vec![1e-1],
            weight_decay: vec![0.0, 1e-4],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RmsPropGrid {
    pub lr: Vec<f64>,
    pub rho: Vec<f64>,
    pub momentum: Vec<f64>,
    pub decoupled_weight_decay: Vec<f64>,
    pub coupled_weight_decay: Vec<f64>,
}

impl Default for RmsPropGrid {
    fn default() -> Self {
        RmsPropGrid {
            lr: vec![1e-3],
            rho: vec![0.99, 0.9],
            momentum: vec![0.0, 0.9],
            decoupled_weight_decay: vec![0.0, 1e-4, 0.02],
            coupled_weight_decay: vec![0.0, 1e-4, 0.02],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "optimizer", rename_all = "snake_case")]
pub enum OptimizerGrid {
    Sgd(SgdGrid),
    #[serde(rename = "rmsprop")]
    RmsProp(RmsPropGrid),
}

impl OptimizerGrid {
    pub fn expand(&self) -> Vec<OptimizerParams> {
        let mut out = Vec::new();
        match self {
            OptimizerGrid::Sgd(grid) => {
                for &(nesterov, momentum) in &grid.nesterov_momentum {
                    for &lr in &grid.lr {
                        for &weight_decay in &grid.weight_decay {
                            out.push(OptimizerParams::Sgd(Sgd {
                                weight_decay,
                                ..Sgd::new(lr).with_momentum(momentum, nesterov)
                            }));
                        }
                    }
                }
            }
            OptimizerGrid::RmsProp(grid) => {
                for &lr in &grid.lr {
                    for &rho in &grid.rho {
                        for &momentum in &grid.momentum {
                            for &decoupled_weight_decay in &grid.decoupled_weight_decay {
                                for &coupled_weight_decay in &grid.coupled_weight_decay {
                                    out.push(OptimizerParams::RmsProp(RmsProp {
                                        momentum,
                                        coupled_weight_decay,
                                        decoupled_weight_decay,
                                        ..RmsProp::new(lr, rho)
                                    }));
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

/// Base grid composed with one optimizer grid for one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverGrid {
    pub engine: Framework,
    #[serde(default)]
    pub base: BaseGrid,
    pub optimizer: OptimizerGrid,
    #[serde(default)]
    pub stopping: SufficientProgressCriterion,
    #[serde(default)]
    pub num_workers: Option<usize>,
    #[serde(default)]
    pub seed: u64,
}

impl SolverGrid {
    pub fn new(engine: Framework, optimizer: OptimizerGrid) -> SolverGrid {
        SolverGrid {
            engine,
            base: BaseGrid::default(),
            optimizer,
            stopping: SufficientProgressCriterion::default(),
            num_workers: None,
            seed: 0,
        }
    }

    pub fn sgd(engine: Framework) -> SolverGrid {
        SolverGrid::new(engine, OptimizerGrid::Sgd(SgdGrid::default()))
    }

    pub fn rmsprop(engine: Framework) -> SolverGrid {
        SolverGrid::new(engine, OptimizerGrid::RmsProp(RmsPropGrid::default()))
    }

    /// One config per combination, base parameters varying slowest.
    pub fn expand(&self) -> Vec<SolverConfig> {
        let optimizers = self.optimizer.expand();
        let mut out = Vec::with_capacity(self.base.len() * optimizers.len());
        for base in self.base.expand() {
            for &optimizer in &optimizers {
                out.push(SolverConfig {
                    stopping: self.stopping,
                    num_workers: self.num_workers,
                    seed: self.seed,
                    ..SolverConfig::new(self.engine, base, optimizer)
                });
            }
        }
        out
    }
}

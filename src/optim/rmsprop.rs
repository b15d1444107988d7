use serde::{Deserialize, Serialize};

use crate::optim::rule::UpdateRule;

pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Hyperparameters of RMSprop, with either kind of weight decay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RmsProp {
    pub learning_rate: f64,
    pub rho: f64,
    #[serde(default)]
    pub momentum: f64,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default)]
    pub coupled_weight_decay: f64,
    #[serde(default)]
    pub decoupled_weight_decay: f64,
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

impl RmsProp {
    pub fn new(learning_rate: f64, rho: f64) -> RmsProp {
        RmsProp {
            learning_rate,
            rho,
            momentum: 0.0,
            epsilon: DEFAULT_EPSILON,
            coupled_weight_decay: 0.0,
            decoupled_weight_decay: 0.0,
        }
    }

    pub fn rule(&self) -> UpdateRule {
        UpdateRule::RmsProp { rho: self.rho, momentum: self.momentum, epsilon: self.epsilon }
    }
}

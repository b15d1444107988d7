use serde::{Serialize, Deserialize};

use crate::optim::rule::UpdateRule;

/// Hyperparameters of stochastic gradient descent.
///
/// `weight_decay` is coupled (added to the gradient).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sgd {
    pub learning_rate: f64,
    #[serde(default)]
    pub momentum: f64,
    #[serde(default)]
    pub nesterov: bool,
    #[serde(default)]
    pub weight_decay: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate, momentum: 0.0, nesterov: false, weight_decay: 0.0 }
    }

    pub fn with_momentum(self, momentum: f64, nesterov: bool) -> Sgd {
        Sgd { momentum, nesterov, ..self }
    }

    pub fn rule(&self) -> UpdateRule {
        UpdateRule::Sgd { momentum: self.momentum, nesterov: self.nesterov }
    }
}

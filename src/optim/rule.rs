//! Parameter update rules shared by both training engines.
//!
//! Each engine keeps its own [`SlotState`] storage, but the arithmetic of a
//! step lives here only, so identical hyperparameters give identical updates
//! whichever engine runs the loop.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdateRule {
    /// `v = m v + g`; `p -= lr (g + m v)` with Nesterov, else `p -= lr v`.
    Sgd { momentum: f64, nesterov: bool },
    /// `s = ρ s + (1 - ρ) g²`; `u = g / (√s + ε)`; with momentum
    /// `b = m b + u; p -= lr b`, else `p -= lr u`.
    RmsProp { rho: f64, momentum: f64, epsilon: f64 },
}

/// Per-parameter optimizer slots. Buffers are sized on first use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotState {
    pub velocity: Vec<f64>,
    pub square_avg: Vec<f64>,
}

impl SlotState {
    fn velocity(&mut self, n: usize) -> &mut [f64] {
        if self.velocity.len() != n {
            self.velocity = vec![0.0; n];
        }
        &mut self.velocity
    }
}

impl UpdateRule {
    /// Applies one in-place step to `params`.
    pub fn apply(&self, params: &mut [f64], grads: &[f64], slots: &mut SlotState, lr: f64) {
        assert_eq!(params.len(), grads.len(), "parameter and gradient lengths differ");
        let n = params.len();

        match *self {
            UpdateRule::Sgd { momentum, nesterov } => {
                if momentum == 0.0 {
                    for (p, g) in params.iter_mut().zip(grads) {
                        *p -= lr * g;
                    }
                    return;
                }
                let velocity = slots.velocity(n);
                for ((p, g), v) in params.iter_mut().zip(grads).zip(velocity.iter_mut()) {
                    *v = momentum * *v + g;
                    let direction = if nesterov { g + momentum * *v } else { *v };
                    *p -= lr * direction;
                }
            }
            UpdateRule::RmsProp { rho, momentum, epsilon } => {
                if slots.square_avg.len() != n {
                    slots.square_avg = vec![0.0; n];
                }
                if momentum > 0.0 && slots.velocity.len() != n {
                    slots.velocity = vec![0.0; n];
                }
                for i in 0..n {
                    let g = grads[i];
                    let s = &mut slots.square_avg[i];
                    *s = rho * *s + (1.0 - rho) * g * g;
                    let update = g / (s.sqrt() + epsilon);
                    if momentum > 0.0 {
                        let b = &mut slots.velocity[i];
                        *b = momentum * *b + update;
                        params[i] -= lr * *b;
                    } else {
                        params[i] -= lr * update;
                    }
                }
            }
        }
    }
}

/// How weight decay enters an update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum WeightDecay {
    #[default]
    None,
    /// Added to the gradient: `g += wd p`.
    Coupled(f64),
    /// Applied to the weights outside the rule: `p -= lr_t wd p`.
    Decoupled(f64),
}

impl WeightDecay {
    /// `None` when both kinds are requested; callers treat that as a skip.
    pub fn from_pair(coupled: f64, decoupled: f64) -> Option<WeightDecay> {
        match (coupled != 0.0, decoupled != 0.0) {
            (true, true) => None,
            (true, false) => Some(WeightDecay::Coupled(coupled)),
            (false, true) => Some(WeightDecay::Decoupled(decoupled)),
            (false, false) => Some(WeightDecay::None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn plain_sgd_is_gradient_descent() {
        let mut p = vec![1.0, -2.0];
        UpdateRule::Sgd { momentum: 0.0, nesterov: false }
            .apply(&mut p, &[0.5, 1.0], &mut SlotState::default(), 0.1);
        assert_relative_eq!(p[0], 0.95);
        assert_relative_eq!(p[1], -2.1);
    }

    #[test]
    fn momentum_accumulates_across_steps() {
        let rule = UpdateRule::Sgd { momentum: 0.9, nesterov: false };
        let mut slots = SlotState::default();
        let mut p = vec![0.0];
        rule.apply(&mut p, &[1.0], &mut slots, 1.0);
        rule.apply(&mut p, &[1.0], &mut slots, 1.0);
        // v1 = 1, v2 = 1.9
        assert_relative_eq!(p[0], -2.9);

        let nesterov = UpdateRule::Sgd { momentum: 0.9, nesterov: true };
        let mut q = vec![0.0];
        nesterov.apply(&mut q, &[1.0], &mut SlotState::default(), 1.0);
        assert_relative_eq!(q[0], -1.9);
    }

    #[test]
    fn rmsprop_first_step_matches_formula() {
        let rule = UpdateRule::RmsProp { rho: 0.9, momentum: 0.0, epsilon: 1e-8 };
        let mut p = vec![1.0];
        rule.apply(&mut p, &[2.0], &mut SlotState::default(), 0.01);
        let s: f64 = 0.1 * 4.0;
        assert_relative_eq!(p[0], 1.0 - 0.01 * 2.0 / (s.sqrt() + 1e-8), epsilon = 1e-12);
    }

    #[test]
    fn both_decays_are_contradictory() {
        assert_eq!(WeightDecay::from_pair(1e-4, 0.02), None);
        assert_eq!(WeightDecay::from_pair(0.0, 0.02), Some(WeightDecay::Decoupled(0.02)));
        assert_eq!(WeightDecay::from_pair(0.0, 0.0), Some(WeightDecay::None));
    }
}

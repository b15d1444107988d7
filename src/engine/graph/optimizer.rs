use crate::engine::graph::model::Variable;
use crate::optim::rule::{SlotState, UpdateRule};
use crate::optim::schedule::{lr_multiplier, LrSchedule};

/// Optimizer owned by the graph engine.
///
/// Slot variables are created on first use, one per model variable. The
/// learning rate and the decoupled decay follow the same per-epoch
/// multiplier, so `decay` must already be scaled by the base learning rate.
#[derive(Debug, Clone)]
pub struct GraphOptimizer {
    rule: UpdateRule,
    learning_rate: f64,
    decay: f64,
    schedule: Option<LrSchedule>,
    epoch: usize,
    iterations: u64,
    slots: Vec<SlotState>,
}

impl GraphOptimizer {
    pub fn new(rule: UpdateRule, learning_rate: f64) -> GraphOptimizer {
        GraphOptimizer {
            rule,
            learning_rate,
            decay: 0.0,
            schedule: None,
            epoch: 0,
            iterations: 0,
            slots: Vec::new(),
        }
    }

    /// Decoupled decay `w -= decay * multiplier * w` applied before each
    /// update.
    pub fn with_decay(self, decay: f64) -> GraphOptimizer {
        GraphOptimizer { decay, ..self }
    }

    pub fn with_schedule(self, schedule: Option<LrSchedule>) -> GraphOptimizer {
        GraphOptimizer { schedule, ..self }
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn current_learning_rate(&self) -> f64 {
        self.learning_rate * self.multiplier()
    }

    fn multiplier(&self) -> f64 {
        lr_multiplier(self.schedule.as_ref(), self.epoch)
    }

    pub fn end_epoch(&mut self) {
        self.epoch += 1;
    }

    pub fn apply_gradients(&mut self, variables: &mut [Variable], gradients: &[Vec<f64>]) {
        if self.slots.len() != variables.len() {
            self.slots.resize_with(variables.len(), SlotState::default);
        }
        let multiplier = self.multiplier();
        let lr = self.learning_rate * multiplier;
        let keep = 1.0 - self.decay * multiplier;

        for ((variable, grad), slot) in variables.iter_mut().zip(gradients).zip(self.slots.iter_mut()) {
            if self.decay != 0.0 {
                variable.value.data.iter_mut().for_each(|w| *w *= keep);
            }
            self.rule.apply(&mut variable.value.data, grad, slot, lr);
        }
        self.iterations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::Matrix;
    use crate::optim::schedule::{STEP_GAMMA, STEP_SIZE};
    use approx::assert_relative_eq;

    fn var(values: Vec<f64>) -> Variable {
        Variable { name: "v".into(), value: Matrix::row_vector(&values) }
    }

    #[test]
    fn decay_and_step_match_the_reference_formula() {
        let rule = UpdateRule::Sgd { momentum: 0.0, nesterov: false };
        let (lr, wd) = (0.1, 0.02);
        let mut opt = GraphOptimizer::new(rule, lr).with_decay(lr * wd);
        let mut vars = vec![var(vec![1.0, -2.0])];
        opt.apply_gradients(&mut vars, &[vec![0.5, 0.5]]);
        // w <- w (1 - lr wd) - lr g
        assert_relative_eq!(vars[0].value.data[0], 1.0 * (1.0 - lr * wd) - lr * 0.5, epsilon = 1e-12);
        assert_relative_eq!(vars[0].value.data[1], -2.0 * (1.0 - lr * wd) - lr * 0.5, epsilon = 1e-12);
        assert_eq!(opt.iterations(), 1);
    }

    #[test]
    fn schedule_scales_the_rate_per_epoch() {
        let rule = UpdateRule::Sgd { momentum: 0.0, nesterov: false };
        let mut opt = GraphOptimizer::new(rule, 1.0).with_schedule(Some(LrSchedule::Step {
            step_size: STEP_SIZE,
            gamma: STEP_GAMMA,
        }));
        for _ in 0..STEP_SIZE {
            opt.end_epoch();
        }
        assert_relative_eq!(opt.current_learning_rate(), STEP_GAMMA, epsilon = 1e-12);
    }
}

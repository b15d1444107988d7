use crate::optim::rule::{SlotState, UpdateRule, WeightDecay};
use crate::optim::schedule::LrSchedule;

/// Stateful optimizer used by the imperative engine.
///
/// Parameters are addressed by a stable id chosen by the model (layer `i`
/// owns ids `2i` for weights and `2i + 1` for biases).
#[derive(Debug, Clone)]
pub struct Optimizer {
    rule: UpdateRule,
    learning_rate: f64,
    weight_decay: WeightDecay,
    slots: Vec<SlotState>,
}

impl Optimizer {
    pub fn new(rule: UpdateRule, learning_rate: f64, weight_decay: WeightDecay) -> Optimizer {
        Optimizer { rule, learning_rate, weight_decay, slots: Vec::new() }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    /// Applies one update to parameter `id`.
    pub fn step(&mut self, id: usize, params: &mut [f64], grads: &[f64]) {
        if self.slots.len() <= id {
            self.slots.resize_with(id + 1, SlotState::default);
        }
        let lr = self.learning_rate;

        match self.weight_decay {
            WeightDecay::None => self.rule.apply(params, grads, &mut self.slots[id], lr),
            WeightDecay::Coupled(wd) => {
                let decayed: Vec<f64> = grads.iter().zip(params.iter())
                    .map(|(g, p)| g + wd * p)
                    .collect();
                self.rule.apply(params, &decayed, &mut self.slots[id], lr);
            }
            WeightDecay::Decoupled(wd) => {
                let keep = 1.0 - lr * wd;
                for p in params.iter_mut() {
                    *p *= keep;
                }
                self.rule.apply(params, grads, &mut self.slots[id], lr);
            }
        }
    }
}

/// Per-epoch driver of an [`LrSchedule`] for an [`Optimizer`].
#[derive(Debug, Clone)]
pub struct LrScheduler {
    schedule: LrSchedule,
    base_lr: f64,
    epoch: usize,
}

impl LrScheduler {
    pub fn new(schedule: LrSchedule, base_lr: f64) -> LrScheduler {
        LrScheduler { schedule, base_lr, epoch: 0 }
    }

    /// Marks one more epoch as done and updates the optimizer's rate.
    pub fn step(&mut self, optimizer: &mut Optimizer) {
        self.epoch += 1;
        optimizer.set_learning_rate(self.schedule.learning_rate(self.base_lr, self.epoch));
    }
}

/// Result of the solver's optimizer-binding step, consumed by the
/// imperative training loop.
#[derive(Debug, Clone)]
pub struct OptimizerBinding {
    pub optimizer: Optimizer,
    pub scheduler: Option<LrScheduler>,
}

impl OptimizerBinding {
    /// Without a schedule the learning rate stays constant.
    pub fn new(optimizer: Optimizer, schedule: Option<LrSchedule>) -> OptimizerBinding {
        let base_lr = optimizer.learning_rate();
        OptimizerBinding {
            optimizer,
            scheduler: schedule.map(|s| LrScheduler::new(s, base_lr)),
        }
    }

    pub fn end_epoch(&mut self) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.step(&mut self.optimizer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PLAIN: UpdateRule = UpdateRule::Sgd { momentum: 0.0, nesterov: false };

    #[test]
    fn coupled_decay_adds_to_gradient() {
        let mut opt = Optimizer::new(PLAIN, 0.1, WeightDecay::Coupled(0.5));
        let mut p = vec![2.0];
        opt.step(0, &mut p, &[0.0]);
        assert_relative_eq!(p[0], 2.0 - 0.1 * 0.5 * 2.0);
    }

    #[test]
    fn decoupled_decay_shrinks_weights_by_lr_times_wd() {
        let mut opt = Optimizer::new(PLAIN, 0.1, WeightDecay::Decoupled(0.5));
        let mut p = vec![2.0];
        opt.step(3, &mut p, &[1.0]);
        assert_relative_eq!(p[0], 2.0 * (1.0 - 0.05) - 0.1);
    }

    #[test]
    fn binding_without_schedule_keeps_rate() {
        let mut binding = OptimizerBinding::new(Optimizer::new(PLAIN, 0.1, WeightDecay::None), None);
        for _ in 0..100 {
            binding.end_epoch();
        }
        assert_eq!(binding.optimizer.learning_rate(), 0.1);

        let step = LrSchedule::Step { step_size: 2, gamma: 0.5 };
        let mut scheduled = OptimizerBinding::new(Optimizer::new(PLAIN, 0.1, WeightDecay::None), Some(step));
        scheduled.end_epoch();
        scheduled.end_epoch();
        assert_relative_eq!(scheduled.optimizer.learning_rate(), 0.05);
    }
}

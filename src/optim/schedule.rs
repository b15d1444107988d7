use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Step decay: multiply by `STEP_GAMMA` every `STEP_SIZE` epochs.
pub const STEP_SIZE: usize = 30;
pub const STEP_GAMMA: f64 = 0.1;
/// Half-period of the cosine schedule, in epochs.
pub const COSINE_T_MAX: usize = 200;

/// Learning-rate schedule choice as it appears in a parameter grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LrScheduleKind {
    #[default]
    None,
    Step,
    Cosine,
}

impl std::fmt::Display for LrScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LrScheduleKind::None => "none",
            LrScheduleKind::Step => "step",
            LrScheduleKind::Cosine => "cosine",
        };
        f.write_str(name)
    }
}

/// Epoch-indexed learning-rate schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LrSchedule {
    Step { step_size: usize, gamma: f64 },
    Cosine { t_max: usize, eta_min: f64 },
}

impl LrSchedule {
    /// `None` for [`LrScheduleKind::None`]: callers run at a constant rate.
    pub fn from_kind(kind: LrScheduleKind) -> Option<LrSchedule> {
        match kind {
            LrScheduleKind::None => None,
            LrScheduleKind::Step => Some(LrSchedule::Step { step_size: STEP_SIZE, gamma: STEP_GAMMA }),
            LrScheduleKind::Cosine => Some(LrSchedule::Cosine { t_max: COSINE_T_MAX, eta_min: 0.0 }),
        }
    }

    /// Learning rate after `epoch` completed epochs.
    pub fn learning_rate(&self, base_lr: f64, epoch: usize) -> f64 {
        match *self {
            LrSchedule::Step { step_size, gamma } => {
                base_lr * gamma.powi((epoch / step_size.max(1)) as i32)
            }
            LrSchedule::Cosine { t_max, eta_min } => {
                let phase = PI * epoch as f64 / t_max.max(1) as f64;
                eta_min + (base_lr - eta_min) * (1.0 + phase.cos()) / 2.0
            }
        }
    }
}

/// Multiplier `lr_t / lr_0` for an optional schedule.
pub fn lr_multiplier(schedule: Option<&LrSchedule>, epoch: usize) -> f64 {
    schedule.map_or(1.0, |s| s.learning_rate(1.0, epoch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn step_schedule_decays_every_thirty_epochs() {
        let s = LrSchedule::from_kind(LrScheduleKind::Step).unwrap();
        assert_relative_eq!(s.learning_rate(0.1, 29), 0.1);
        assert_relative_eq!(s.learning_rate(0.1, 30), 0.01);
        assert_relative_eq!(s.learning_rate(0.1, 61), 0.001, epsilon = 1e-15);
    }

    #[test]
    fn cosine_schedule_hits_zero_at_t_max() {
        let s = LrSchedule::from_kind(LrScheduleKind::Cosine).unwrap();
        assert_relative_eq!(s.learning_rate(0.1, 0), 0.1);
        assert_relative_eq!(s.learning_rate(0.1, 100), 0.05, epsilon = 1e-12);
        assert_relative_eq!(s.learning_rate(0.1, 200), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn absent_schedule_means_constant() {
        assert_eq!(LrSchedule::from_kind(LrScheduleKind::None), None);
        assert_eq!(lr_multiplier(None, 500), 1.0);
    }
}

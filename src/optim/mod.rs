pub mod optimizer;
pub mod rmsprop;
pub mod rule;
pub mod schedule;
pub mod sgd;

pub use optimizer::{LrScheduler, Optimizer, OptimizerBinding};
pub use rmsprop::RmsProp;
pub use rule::{SlotState, UpdateRule, WeightDecay};
pub use schedule::{LrSchedule, LrScheduleKind};
pub use sgd::Sgd;

pub mod criterion;

pub use criterion::{
    Decision, Direction, Status, StoppingState, Strategy, SufficientProgressCriterion, DEFAULT_PATIENCE,
};

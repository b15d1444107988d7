use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::objective::{Classifier, Evaluator, ObjectiveValue};
use crate::stopping::{Decision, StoppingState, SufficientProgressCriterion};

/// Invoked by a training loop at every checkpoint.
pub trait Callback {
    fn checkpoint(&mut self, model: &dyn Classifier) -> Result<Decision>;
}

/// One entry of the objective history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSample {
    pub checkpoint_index: usize,
    pub value: f64,
    pub objective: ObjectiveValue,
}

/// Samples the objective, records it and asks the patience rule whether to
/// go on.
pub struct ProgressCallback<E> {
    evaluator: E,
    state: StoppingState,
    history: Vec<ObjectiveSample>,
    max_checkpoints: Option<usize>,
}

impl<E: Evaluator> ProgressCallback<E> {
    pub fn new(evaluator: E, criterion: &SufficientProgressCriterion) -> ProgressCallback<E> {
        ProgressCallback { evaluator, state: criterion.start(), history: Vec::new(), max_checkpoints: None }
    }

    /// Hard cap on the number of checkpoints, reached regardless of progress.
    pub fn with_max_checkpoints(self, max_checkpoints: Option<usize>) -> ProgressCallback<E> {
        ProgressCallback { max_checkpoints, ..self }
    }

    pub fn history(&self) -> &[ObjectiveSample] {
        &self.history
    }

    pub fn into_history(self) -> Vec<ObjectiveSample> {
        self.history
    }

    pub fn state(&self) -> &StoppingState {
        &self.state
    }
}

impl<E: Evaluator> Callback for ProgressCallback<E> {
    fn checkpoint(&mut self, model: &dyn Classifier) -> Result<Decision> {
        let objective = self.evaluator.evaluate(model)?;
        let sample = ObjectiveSample {
            checkpoint_index: self.history.len(),
            value: objective.value(),
            objective,
        };
        self.history.push(sample);

        if !sample.value.is_finite() {
            warn!(checkpoint = sample.checkpoint_index, value = sample.value, "non-finite objective");
        }

        let mut decision = self.state.evaluate(sample.checkpoint_index, sample.value);
        if self.max_checkpoints.is_some_and(|cap| self.history.len() >= cap) {
            decision = Decision::Stop;
        }

        debug!(
            checkpoint = sample.checkpoint_index,
            train_loss = objective.train_loss,
            test_loss = objective.test_loss,
            test_error = objective.test_error,
            stalled = self.state.non_improving_count(),
            ?decision,
            "checkpoint"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::images::Layout;

    /// Replays a fixed sequence of training losses.
    struct Replay {
        values: std::vec::IntoIter<f64>,
    }

    impl Evaluator for Replay {
        fn evaluate(&mut self, _model: &dyn Classifier) -> Result<ObjectiveValue> {
            let v = self.values.next().unwrap_or(f64::NAN);
            Ok(ObjectiveValue { train_loss: v, test_loss: v, test_error: 0.0 })
        }
    }

    struct Dummy;

    impl Classifier for Dummy {
        fn input_layout(&self) -> Layout {
            Layout::ChannelsFirst
        }

        fn predict(&self, _sample: &[f32]) -> Vec<f64> {
            vec![1.0]
        }
    }

    fn callback(values: Vec<f64>, patience: usize) -> ProgressCallback<Replay> {
        ProgressCallback::new(Replay { values: values.into_iter() }, &SufficientProgressCriterion::new(patience))
    }

    #[test]
    fn history_indices_follow_call_order() {
        let mut cb = callback(vec![1.0, 0.9, 0.95, 0.95, 0.95], 2);
        let decisions: Vec<Decision> = (0..5).map(|_| cb.checkpoint(&Dummy).unwrap()).collect();
        assert_eq!(decisions.last(), Some(&Decision::Stop));
        let indices: Vec<usize> = cb.history().iter().map(|s| s.checkpoint_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(cb.history()[1].value, 0.9);
    }

    #[test]
    fn max_checkpoints_forces_a_stop() {
        let mut cb = callback(vec![3.0, 2.0, 1.0], 20).with_max_checkpoints(Some(2));
        assert_eq!(cb.checkpoint(&Dummy).unwrap(), Decision::Continue);
        assert_eq!(cb.checkpoint(&Dummy).unwrap(), Decision::Stop);
        assert_eq!(cb.into_history().len(), 2);
    }
}

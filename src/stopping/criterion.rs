use serde::{Deserialize, Serialize};

/// Default number of consecutive non-improving checkpoints tolerated.
pub const DEFAULT_PATIENCE: usize = 20;

/// When checkpoints are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// At the training loop's natural granularity (once per epoch).
    #[default]
    Callback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Minimize,
    Maximize,
}

impl Direction {
    fn improves(self, candidate: f64, best: f64) -> bool {
        match self {
            Direction::Minimize => candidate < best,
            Direction::Maximize => candidate > best,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Continue,
    Stop,
}

impl Decision {
    pub fn is_stop(self) -> bool {
        self == Decision::Stop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Running,
    Stopped,
}

/// Patience rule: stop once more than `patience` consecutive checkpoints
/// fail to strictly improve on the best value seen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SufficientProgressCriterion {
    pub patience: usize,
    pub strategy: Strategy,
    pub direction: Direction,
}

impl Default for SufficientProgressCriterion {
    fn default() -> Self {
        SufficientProgressCriterion {
            patience: DEFAULT_PATIENCE,
            strategy: Strategy::Callback,
            direction: Direction::Minimize,
        }
    }
}

impl SufficientProgressCriterion {
    pub fn new(patience: usize) -> SufficientProgressCriterion {
        SufficientProgressCriterion { patience, ..Default::default() }
    }

    pub fn maximizing(self) -> SufficientProgressCriterion {
        SufficientProgressCriterion { direction: Direction::Maximize, ..self }
    }

    /// Fresh state for one run.
    pub fn start(&self) -> StoppingState {
        StoppingState {
            best_value: None,
            best_index: None,
            non_improving_count: 0,
            seen: 0,
            patience: self.patience,
            direction: self.direction,
            status: Status::Running,
        }
    }
}

/// Mutable state of one run of the patience rule.
#[derive(Debug, Clone, PartialEq)]
pub struct StoppingState {
    best_value: Option<f64>,
    best_index: Option<usize>,
    non_improving_count: usize,
    seen: usize,
    patience: usize,
    direction: Direction,
    status: Status,
}

impl StoppingState {
    /// Feeds the next sample, in checkpoint order.
    ///
    /// The first finite sample always improves. Non-finite samples never
    /// improve. Once stopped, every later sample is answered with `Stop`.
    pub fn evaluate(&mut self, checkpoint_index: usize, value: f64) -> Decision {
        self.seen += 1;
        if self.status == Status::Stopped {
            return Decision::Stop;
        }

        let improved = value.is_finite()
            && self.best_value.map_or(true, |best| self.direction.improves(value, best));

        if improved {
            self.best_value = Some(value);
            self.best_index = Some(checkpoint_index);
            self.non_improving_count = 0;
            return Decision::Continue;
        }

        self.non_improving_count += 1;
        if self.non_improving_count > self.patience {
            self.status = Status::Stopped;
            Decision::Stop
        } else {
            Decision::Continue
        }
    }

    /// Best value and the checkpoint it was seen at.
    pub fn best(&self) -> Option<(usize, f64)> {
        self.best_index.zip(self.best_value)
    }

    pub fn non_improving_count(&self) -> usize {
        self.non_improving_count
    }

    pub fn samples_seen(&self) -> usize {
        self.seen
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Decision::{Continue as C, Stop as S};

    fn decisions(patience: usize, values: &[f64]) -> Vec<Decision> {
        let mut state = SufficientProgressCriterion::new(patience).start();
        values.iter().enumerate().map(|(i, &v)| state.evaluate(i, v)).collect()
    }

    #[test]
    fn plateau_after_improvement() {
        assert_eq!(decisions(2, &[1.0, 0.9, 0.95, 0.95, 0.95]), vec![C, C, C, C, S]);
    }

    #[test]
    fn strictly_decreasing_never_stops() {
        let values: Vec<f64> = (0..200).map(|i| 1.0 / (i + 1) as f64).collect();
        assert!(decisions(0, &values).iter().all(|d| *d == C));
    }

    #[test]
    fn stops_at_best_plus_patience_plus_one() {
        // best at index 3, patience 4: stop at index 8
        let values = [5.0, 4.0, 3.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0];
        let d = decisions(4, &values);
        assert_eq!(d.iter().position(|x| *x == S), Some(8));
    }

    #[test]
    fn equal_value_is_not_an_improvement() {
        assert_eq!(decisions(0, &[1.0, 1.0]), vec![C, S]);
    }

    #[test]
    fn non_finite_values_count_as_stalls() {
        let mut state = SufficientProgressCriterion::new(1).start();
        assert_eq!(state.evaluate(0, f64::NAN), C);
        assert_eq!(state.best(), None);
        assert_eq!(state.evaluate(1, 0.5), C);
        assert_eq!(state.evaluate(2, f64::INFINITY), C);
        assert_eq!(state.evaluate(3, f64::NAN), S);
        assert_eq!(state.best(), Some((1, 0.5)));
    }

    #[test]
    fn stop_is_sticky() {
        let mut state = SufficientProgressCriterion::new(0).start();
        state.evaluate(0, 1.0);
        assert_eq!(state.evaluate(1, 2.0), S);
        assert_eq!(state.evaluate(2, -100.0), S);
        assert_eq!(state.status(), Status::Stopped);
        assert_eq!(state.samples_seen(), 3);
    }

    #[test]
    fn maximizing_tracks_the_largest_value() {
        let mut state = SufficientProgressCriterion::new(0).maximizing().start();
        state.evaluate(0, 0.1);
        assert_eq!(state.evaluate(1, 0.3), C);
        assert_eq!(state.evaluate(2, 0.2), S);
        assert_eq!(state.best(), Some((1, 0.3)));
    }

    #[test]
    fn default_patience_is_twenty() {
        let criterion: SufficientProgressCriterion = serde_json::from_str("{}").unwrap();
        assert_eq!(criterion.patience, DEFAULT_PATIENCE);
        assert_eq!(criterion.strategy, Strategy::Callback);
    }
}

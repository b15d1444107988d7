//! Objective evaluation at checkpoints.
//!
//! An [`Evaluator`] turns a model snapshot into an [`ObjectiveValue`]. The
//! value tracked by the stopping rule is the training loss; test loss and
//! test error are reported alongside it.

use serde::{Deserialize, Serialize};

use crate::data::images::{Images, Layout};
use crate::datasets::{Dataset, DatasetPayload};
use crate::error::{BenchError, Result};
use crate::loss::cross_entropy::CrossEntropyLoss;

/// A model that maps one image to class probabilities.
pub trait Classifier {
    /// Layout `predict` expects its input in.
    fn input_layout(&self) -> Layout;

    fn predict(&self, sample: &[f32]) -> Vec<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveValue {
    pub train_loss: f64,
    pub test_loss: f64,
    pub test_error: f64,
}

impl ObjectiveValue {
    /// Scalar handed to the stopping criterion.
    pub fn value(&self) -> f64 {
        self.train_loss
    }
}

pub trait Evaluator {
    fn evaluate(&mut self, model: &dyn Classifier) -> Result<ObjectiveValue>;
}

/// One labelled split, kept in both layouts so either engine's model can be
/// scored without a transpose per checkpoint.
#[derive(Debug, Clone)]
struct Split {
    channels_first: Images,
    channels_last: Images,
    labels: Vec<usize>,
}

impl Split {
    fn from_dataset(dataset: &Dataset) -> Split {
        let images = dataset.images();
        Split {
            channels_first: images.to_layout(Layout::ChannelsFirst),
            channels_last: images.to_layout(Layout::ChannelsLast),
            labels: dataset.labels().to_vec(),
        }
    }

    fn images(&self, layout: Layout) -> &Images {
        match layout {
            Layout::ChannelsFirst => &self.channels_first,
            Layout::ChannelsLast => &self.channels_last,
        }
    }

    /// Mean cross-entropy and error rate; `NaN` for an empty split.
    fn score(&self, model: &dyn Classifier) -> Result<(f64, f64)> {
        if self.labels.is_empty() {
            return Ok((f64::NAN, f64::NAN));
        }
        let images = self.images(model.input_layout());
        let mut loss = 0.0;
        let mut errors = 0usize;
        for (i, &label) in self.labels.iter().enumerate() {
            let probabilities = model.predict(images.sample(i));
            if label >= probabilities.len() {
                return Err(BenchError::evaluation(format!(
                    "model returned {} class scores but sample {} has label {}",
                    probabilities.len(), i, label
                )));
            }
            loss += CrossEntropyLoss::loss(&probabilities, label);
            // no finite score counts as a wrong prediction
            if CrossEntropyLoss::argmax(&probabilities) != Some(label) {
                errors += 1;
            }
        }
        let n = self.labels.len() as f64;
        Ok((loss / n, errors as f64 / n))
    }
}

/// Cross-entropy classification objective over a dataset's train and test
/// splits.
#[derive(Debug, Clone)]
pub struct ClassificationObjective {
    train: Split,
    test: Split,
}

impl ClassificationObjective {
    pub fn new(train: &Dataset, test: &Dataset) -> Result<ClassificationObjective> {
        if train.is_empty() {
            return Err(BenchError::evaluation("cannot evaluate on an empty training set"));
        }
        Ok(ClassificationObjective {
            train: Split::from_dataset(train),
            test: Split::from_dataset(test),
        })
    }

    pub fn from_payload(payload: &DatasetPayload) -> Result<ClassificationObjective> {
        ClassificationObjective::new(&payload.dataset, &payload.test_dataset)
    }
}

impl Evaluator for ClassificationObjective {
    fn evaluate(&mut self, model: &dyn Classifier) -> Result<ObjectiveValue> {
        let (train_loss, _) = self.train.score(model)?;
        let (test_loss, test_error) = self.test.score(model)?;
        Ok(ObjectiveValue { train_loss, test_loss, test_error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::images::ImageShape;
    use crate::data::tensor_dataset::TensorDataset;
    use approx::assert_relative_eq;

    /// Predicts class 0 with probability `p0` whatever the input.
    struct Constant {
        p0: f64,
    }

    impl Classifier for Constant {
        fn input_layout(&self) -> Layout {
            Layout::ChannelsLast
        }

        fn predict(&self, _sample: &[f32]) -> Vec<f64> {
            vec![self.p0, 1.0 - self.p0]
        }
    }

    fn dataset(labels: Vec<usize>) -> Dataset {
        let shape = ImageShape::new(1, 1, 1);
        let images = Images::new(Layout::ChannelsFirst, labels.len(), shape, vec![0.0; labels.len()]).unwrap();
        Dataset::Tensor(TensorDataset::new(images, labels).unwrap())
    }

    #[test]
    fn losses_and_error_follow_the_predictions() {
        let mut objective = ClassificationObjective::new(&dataset(vec![0, 0]), &dataset(vec![0, 1, 1, 1])).unwrap();
        let value = objective.evaluate(&Constant { p0: 0.8 }).unwrap();
        assert_relative_eq!(value.train_loss, -(0.8f64).ln(), epsilon = 1e-9);
        assert_relative_eq!(value.test_error, 0.75);
        assert_eq!(value.value(), value.train_loss);
    }

    #[test]
    fn empty_test_split_reports_nan() {
        let mut objective = ClassificationObjective::new(&dataset(vec![1]), &dataset(vec![])).unwrap();
        let value = objective.evaluate(&Constant { p0: 0.5 }).unwrap();
        assert!(value.test_loss.is_nan());
        assert!(value.train_loss.is_finite());
    }

    /// A diverged model: every score is NaN.
    struct Diverged;

    impl Classifier for Diverged {
        fn input_layout(&self) -> Layout {
            Layout::ChannelsFirst
        }

        fn predict(&self, _sample: &[f32]) -> Vec<f64> {
            vec![f64::NAN, f64::NAN]
        }
    }

    #[test]
    fn diverged_model_misclassifies_everything() {
        let mut objective = ClassificationObjective::new(&dataset(vec![0, 1]), &dataset(vec![1, 1, 1, 0])).unwrap();
        let value = objective.evaluate(&Diverged).unwrap();
        assert_eq!(value.test_error, 1.0);
        assert!(value.train_loss.is_nan());
        assert!(value.test_loss.is_nan());
    }

    #[test]
    fn too_few_class_scores_is_an_evaluation_error() {
        let mut objective = ClassificationObjective::new(&dataset(vec![2]), &dataset(vec![])).unwrap();
        assert!(matches!(objective.evaluate(&Constant { p0: 0.5 }), Err(BenchError::Evaluation(_))));
    }
}

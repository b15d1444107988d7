/// Categorical cross-entropy loss for use with a Softmax output layer.
///
/// Targets are class indices; the one-hot expansion is implicit.
pub struct CrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

impl CrossEntropyLoss {
    /// L = -log(predicted[class] + eps)
    pub fn loss(predicted: &[f64], class: usize) -> f64 {
        -(predicted[class] + EPS).ln()
    }

    /// Gradient of the combined Softmax + cross-entropy w.r.t. the logits:
    ///   ∂L/∂z_i = predicted[i] - [i == class]
    pub fn derivative(predicted: &[f64], class: usize) -> Vec<f64> {
        predicted.iter().enumerate()
            .map(|(i, p)| if i == class { p - 1.0 } else { *p })
            .collect()
    }

    /// Index of the largest finite probability, first one on ties. `None`
    /// when no entry is finite.
    pub fn argmax(predicted: &[f64]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &p) in predicted.iter().enumerate() {
            if p.is_finite() && best.map_or(true, |(_, b)| p > b) {
                best = Some((i, p));
            }
        }
        best.map(|(i, _)| i)
    }
}

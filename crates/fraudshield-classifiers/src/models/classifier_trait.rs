use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::config::ParamSet;
use crate::error::ClassifierError;
use crate::models::artifact::ModelArtifact;

/// What a score in `[0, 1]` means for a given estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    /// Calibrated fraud probability.
    Probability,
    /// Monotone squashing of a decision margin. Ranks rows, but is not a
    /// probability.
    Margin,
}

/// Anything that can turn one transformed feature row into a fraud score.
///
/// Higher scores mean more likely fraud. Every implementation returns values
/// in `[0, 1]` regardless of the underlying estimator family.
pub trait Scoreable {
    fn score(&self, features: ArrayView1<'_, f64>) -> Result<f64, ClassifierError>;

    fn score_kind(&self) -> ScoreKind;

    fn score_batch(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ClassifierError> {
        x.rows()
            .into_iter()
            .map(|row| self.score(row))
            .collect::<Result<Vec<f64>, _>>()
            .map(Array1::from)
    }
}

/// A trainable estimator that can take part in model selection.
pub trait Classifier: Scoreable + Send + Sync {
    fn name(&self) -> &str;

    /// Fit on features `x` and binary labels `y` (1 = fraud).
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, u8>) -> Result<(), ClassifierError>;

    /// A fresh, unfitted estimator of the same family with `params` applied.
    fn with_params(&self, params: &ParamSet) -> Result<Box<dyn Classifier>, ClassifierError>;

    /// Hard 0/1 decision at a score threshold of 0.5.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<u8>, ClassifierError> {
        Ok(self.score_batch(x)?.mapv(|s| u8::from(s >= 0.5)))
    }

    /// Hand over the fitted state for persistence.
    fn into_artifact(self: Box<Self>) -> Result<ModelArtifact, ClassifierError> {
        Err(ClassifierError::NotPersistable(self.name().to_string()))
    }
}

pub(crate) fn check_width(expected: usize, actual: usize) -> Result<(), ClassifierError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ClassifierError::ShapeMismatch { expected, actual })
    }
}

/// Both classes must be present and rows must line up with labels.
pub(crate) fn check_training_data(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, u8>,
) -> Result<(), ClassifierError> {
    check_width(x.nrows(), y.len())?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ClassifierError::Training(
            "training features contain non-finite values".to_string(),
        ));
    }
    let positives = y.iter().filter(|&&l| l == 1).count();
    if positives == 0 || positives == y.len() {
        return Err(ClassifierError::Training(
            "training labels contain a single class".to_string(),
        ));
    }
    Ok(())
}

/// Logistic function without overflow for large `|z|`.
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Per-class sample weights, `n / (2 * n_class)` when balanced and 1 otherwise.
pub(crate) fn class_weights(y: ArrayView1<'_, u8>, balanced: bool) -> (f64, f64) {
    if !balanced {
        return (1.0, 1.0);
    }
    let n = y.len() as f64;
    let positives = y.iter().filter(|&&l| l == 1).count() as f64;
    let negatives = n - positives;
    (n / (2.0 * negatives), n / (2.0 * positives))
}

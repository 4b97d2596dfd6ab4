//! Serializable fitted state of the built-in estimators.
//!
//! Each estimator keeps its fitted state in one of these types, so persisting
//! a trained model is a move and a loaded artifact scores rows exactly like the
//! estimator it came from.

use std::fmt;

use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::models::classifier_trait::{check_width, sigmoid, ScoreKind, Scoreable};

/// Weights and intercept of a linear decision function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    pub weights: Array1<f64>,
    pub bias: f64,
}

impl LinearWeights {
    pub fn zeros(n_features: usize) -> Self {
        Self {
            weights: Array1::zeros(n_features),
            bias: 0.0,
        }
    }

    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    pub fn decision(&self, row: ArrayView1<'_, f64>) -> Result<f64, ClassifierError> {
        check_width(self.n_features(), row.len())?;
        Ok(row.dot(&self.weights) + self.bias)
    }

    pub fn decision_batch(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ClassifierError> {
        check_width(self.n_features(), x.ncols())?;
        Ok(x.dot(&self.weights) + self.bias)
    }
}

/// A trained boosted tree ensemble.
#[derive(Serialize, Deserialize)]
pub struct GbdtModel {
    pub n_features: usize,
    pub trees: GBDT,
}

impl fmt::Debug for GbdtModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GbdtModel")
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

pub(crate) fn to_data_vec(x: ArrayView2<'_, f64>) -> DataVec {
    x.rows()
        .into_iter()
        .map(|row| {
            let features = row.iter().map(|&v| v as f32).collect();
            Data::new_training_data(features, 1.0, 0.0, None)
        })
        .collect()
}

impl GbdtModel {
    pub fn probabilities(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ClassifierError> {
        check_width(self.n_features, x.ncols())?;
        let predictions = self.trees.predict(&to_data_vec(x));
        Ok(predictions
            .into_iter()
            .map(|p| f64::from(p).clamp(0.0, 1.0))
            .collect())
    }
}

/// Fitted model as persisted to `model.json`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model")]
pub enum ModelArtifact {
    LogisticRegression(LinearWeights),
    LinearSvm(LinearWeights),
    Gbdt(GbdtModel),
    Prior { rate: f64 },
}

impl ModelArtifact {
    pub fn family(&self) -> &'static str {
        match self {
            ModelArtifact::LogisticRegression(_) => "logistic_regression",
            ModelArtifact::LinearSvm(_) => "linear_svm",
            ModelArtifact::Gbdt(_) => "gbdt",
            ModelArtifact::Prior { .. } => "prior",
        }
    }

    /// Feature count the model was trained on, when it depends on one.
    pub fn n_features(&self) -> Option<usize> {
        match self {
            ModelArtifact::LogisticRegression(w) | ModelArtifact::LinearSvm(w) => {
                Some(w.n_features())
            }
            ModelArtifact::Gbdt(m) => Some(m.n_features),
            ModelArtifact::Prior { .. } => None,
        }
    }
}

impl Scoreable for ModelArtifact {
    fn score(&self, features: ArrayView1<'_, f64>) -> Result<f64, ClassifierError> {
        match self {
            ModelArtifact::LogisticRegression(w) | ModelArtifact::LinearSvm(w) => {
                Ok(sigmoid(w.decision(features)?))
            }
            ModelArtifact::Gbdt(m) => {
                let row = features.insert_axis(ndarray::Axis(0));
                Ok(m.probabilities(row)?[0])
            }
            ModelArtifact::Prior { rate } => Ok(*rate),
        }
    }

    fn score_kind(&self) -> ScoreKind {
        match self {
            ModelArtifact::LinearSvm(_) => ScoreKind::Margin,
            _ => ScoreKind::Probability,
        }
    }

    fn score_batch(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ClassifierError> {
        match self {
            ModelArtifact::LogisticRegression(w) | ModelArtifact::LinearSvm(w) => {
                Ok(w.decision_batch(x)?.mapv(sigmoid))
            }
            ModelArtifact::Gbdt(m) => m.probabilities(x),
            ModelArtifact::Prior { rate } => Ok(Array1::from_elem(x.nrows(), *rate)),
        }
    }
}

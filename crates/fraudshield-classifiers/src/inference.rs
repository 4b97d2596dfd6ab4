//! Single-transaction scoring against persisted artifacts.
//!
//! An [`InferenceContext`] is built once from the artifact directory and is
//! read-only afterwards, so one instance can be shared by reference between
//! any number of callers.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::ParamSet;
use crate::data_handling::FeatureFrame;
use crate::error::{FraudError, Result};
use crate::io::{load_object, save_object, MODEL_FILE, PREPROCESSOR_FILE};
use crate::model_selection::BestCandidate;
use crate::models::{ModelArtifact, ScoreKind, Scoreable};
use crate::preprocessing::FeaturePreprocessor;

/// Scores at or above this are classified as fraud.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Column names of a transaction, in schema order.
pub const TRANSACTION_COLUMNS: [&str; 30] = [
    "Time", "V1", "V2", "V3", "V4", "V5", "V6", "V7", "V8", "V9", "V10", "V11", "V12", "V13",
    "V14", "V15", "V16", "V17", "V18", "V19", "V20", "V21", "V22", "V23", "V24", "V25", "V26",
    "V27", "V28", "Amount",
];

/// One transaction to score. Every field is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    #[serde(rename = "Time")]
    pub time: f64,
    #[serde(rename = "V1")]
    pub v1: f64,
    #[serde(rename = "V2")]
    pub v2: f64,
    #[serde(rename = "V3")]
    pub v3: f64,
    #[serde(rename = "V4")]
    pub v4: f64,
    #[serde(rename = "V5")]
    pub v5: f64,
    #[serde(rename = "V6")]
    pub v6: f64,
    #[serde(rename = "V7")]
    pub v7: f64,
    #[serde(rename = "V8")]
    pub v8: f64,
    #[serde(rename = "V9")]
    pub v9: f64,
    #[serde(rename = "V10")]
    pub v10: f64,
    #[serde(rename = "V11")]
    pub v11: f64,
    #[serde(rename = "V12")]
    pub v12: f64,
    #[serde(rename = "V13")]
    pub v13: f64,
    #[serde(rename = "V14")]
    pub v14: f64,
    #[serde(rename = "V15")]
    pub v15: f64,
    #[serde(rename = "V16")]
    pub v16: f64,
    #[serde(rename = "V17")]
    pub v17: f64,
    #[serde(rename = "V18")]
    pub v18: f64,
    #[serde(rename = "V19")]
    pub v19: f64,
    #[serde(rename = "V20")]
    pub v20: f64,
    #[serde(rename = "V21")]
    pub v21: f64,
    #[serde(rename = "V22")]
    pub v22: f64,
    #[serde(rename = "V23")]
    pub v23: f64,
    #[serde(rename = "V24")]
    pub v24: f64,
    #[serde(rename = "V25")]
    pub v25: f64,
    #[serde(rename = "V26")]
    pub v26: f64,
    #[serde(rename = "V27")]
    pub v27: f64,
    #[serde(rename = "V28")]
    pub v28: f64,
    #[serde(rename = "Amount")]
    pub amount: f64,
}

impl Transaction {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FraudError::InvalidInput(e.to_string()))
    }

    /// Field values in [`TRANSACTION_COLUMNS`] order.
    pub fn values(&self) -> [f64; 30] {
        [
            self.time,
            self.v1,
            self.v2,
            self.v3,
            self.v4,
            self.v5,
            self.v6,
            self.v7,
            self.v8,
            self.v9,
            self.v10,
            self.v11,
            self.v12,
            self.v13,
            self.v14,
            self.v15,
            self.v16,
            self.v17,
            self.v18,
            self.v19,
            self.v20,
            self.v21,
            self.v22,
            self.v23,
            self.v24,
            self.v25,
            self.v26,
            self.v27,
            self.v28,
            self.amount,
        ]
    }

    pub fn validate(&self) -> Result<()> {
        let values = self.values();
        if let Some((name, v)) = TRANSACTION_COLUMNS
            .iter()
            .zip(values.iter())
            .find(|(_, v)| !v.is_finite())
        {
            return Err(FraudError::InvalidInput(format!(
                "{} must be a finite number, got {}",
                name, v
            )));
        }
        if self.time < 0.0 {
            return Err(FraudError::InvalidInput(format!(
                "Time must not be negative, got {}",
                self.time
            )));
        }
        if self.amount < 0.0 {
            return Err(FraudError::InvalidInput(format!(
                "Amount must not be negative, got {}",
                self.amount
            )));
        }
        Ok(())
    }

    pub fn to_frame(&self) -> Result<FeatureFrame> {
        FeatureFrame::from_rows(
            TRANSACTION_COLUMNS.iter().map(|c| c.to_string()).collect(),
            vec![self.values().to_vec()],
        )
    }
}

/// Outcome of scoring one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub fraud_prediction: u8,
    pub fraud_label: String,
    /// `None` when the model only produces decision margins.
    pub fraud_probability: Option<f64>,
}

/// Structured failure returned in place of a [`Prediction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

impl From<&FraudError> for ErrorResponse {
    fn from(err: &FraudError) -> Self {
        ErrorResponse {
            error: err.kind().to_string(),
            detail: err.to_string(),
        }
    }
}

/// The winning model as written to `model.json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedModel {
    pub candidate: String,
    pub score: f64,
    /// RFC 3339 timestamp of the training run.
    pub trained_at: String,
    /// Transformed column order the model expects.
    pub feature_columns: Vec<String>,
    pub best_params: ParamSet,
    pub model: ModelArtifact,
}

impl PersistedModel {
    pub fn from_best(best: BestCandidate, feature_columns: Vec<String>) -> Result<Self> {
        let model = best
            .model
            .into_artifact()
            .map_err(|e| FraudError::persistence(MODEL_FILE, e))?;
        Ok(PersistedModel {
            candidate: best.name,
            score: best.score,
            trained_at: Utc::now().to_rfc3339(),
            feature_columns,
            best_params: best.best_params,
            model,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, artifact_dir: P) -> Result<()> {
        save_object(artifact_dir.as_ref().join(MODEL_FILE), self)
    }
}

/// Fitted preprocessor plus the winning model, loaded once.
#[derive(Debug)]
pub struct InferenceContext {
    preprocessor: FeaturePreprocessor,
    model: PersistedModel,
}

impl InferenceContext {
    /// Load `preprocessor.json` and `model.json` from `artifact_dir`.
    pub fn load<P: AsRef<Path>>(artifact_dir: P) -> Result<Self> {
        let dir = artifact_dir.as_ref();
        let preprocessor: FeaturePreprocessor = load_object(dir.join(PREPROCESSOR_FILE))?;
        let model: PersistedModel = load_object(dir.join(MODEL_FILE))?;
        log::info!(
            "Loaded model '{}' (ROC AUC {:.4}, trained {}) from {}",
            model.candidate,
            model.score,
            model.trained_at,
            dir.display()
        );
        Self::from_parts(preprocessor, model).map_err(|e| match e {
            FraudError::Config(reason) => FraudError::persistence(dir, reason),
            other => other,
        })
    }

    /// Pair a fitted preprocessor with a model trained on its output.
    pub fn from_parts(preprocessor: FeaturePreprocessor, model: PersistedModel) -> Result<Self> {
        let columns = preprocessor.output_columns().map_err(|_| {
            FraudError::Config("preprocessor artifact is not fitted".to_string())
        })?;
        if columns != model.feature_columns {
            return Err(FraudError::Config(format!(
                "model expects columns {:?} but the preprocessor produces {:?}",
                model.feature_columns, columns
            )));
        }
        if let Some(n) = model.model.n_features() {
            if n != columns.len() {
                return Err(FraudError::Config(format!(
                    "model was trained on {} features but the preprocessor produces {}",
                    n,
                    columns.len()
                )));
            }
        }
        Ok(InferenceContext {
            preprocessor,
            model,
        })
    }

    pub fn model(&self) -> &PersistedModel {
        &self.model
    }

    pub fn preprocessor(&self) -> &FeaturePreprocessor {
        &self.preprocessor
    }

    pub fn predict(&self, transaction: &Transaction) -> Result<Prediction> {
        transaction.validate()?;
        let transformed = self.preprocessor.transform(&transaction.to_frame()?)?;
        let score = self
            .model
            .model
            .score(transformed.values().row(0))
            .map_err(|e| FraudError::Schema(e.to_string()))?;

        let fraud_prediction = u8::from(score >= DECISION_THRESHOLD);
        let fraud_label = if fraud_prediction == 1 { "Fraud" } else { "Legitimate" };
        let fraud_probability = match self.model.model.score_kind() {
            ScoreKind::Probability => Some(score),
            ScoreKind::Margin => None,
        };
        log::debug!(
            "Scored transaction: score={:.6}, label={}",
            score,
            fraud_label
        );

        Ok(Prediction {
            fraud_prediction,
            fraud_label: fraud_label.to_string(),
            fraud_probability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction() -> Transaction {
        let mut body = serde_json::Map::new();
        for name in TRANSACTION_COLUMNS {
            body.insert(name.to_string(), serde_json::json!(1.0));
        }
        serde_json::from_value(serde_json::Value::Object(body)).unwrap()
    }

    #[test]
    fn schema_order_is_preserved() {
        let mut tx = transaction();
        tx.time = 7.0;
        tx.v28 = 28.0;
        tx.amount = 99.0;
        let values = tx.values();
        assert_eq!(values[0], 7.0);
        assert_eq!(values[28], 28.0);
        assert_eq!(values[29], 99.0);
    }

    #[test]
    fn missing_field_is_invalid_input() {
        let err = Transaction::from_json(r#"{"Time": 1.0, "Amount": 2.0}"#).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn unknown_field_is_invalid_input() {
        let mut body = serde_json::to_value(transaction()).unwrap();
        body["Merchant"] = serde_json::json!(3.0);
        assert!(Transaction::from_json(&body.to_string()).is_err());
    }

    #[test]
    fn negative_amount_is_rejected() {
        let mut tx = transaction();
        tx.amount = -0.01;
        assert!(matches!(tx.validate(), Err(FraudError::InvalidInput(_))));
        tx.amount = 0.0;
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn non_finite_component_is_rejected() {
        let mut tx = transaction();
        tx.v14 = f64::INFINITY;
        let err = tx.validate().unwrap_err();
        assert!(err.to_string().contains("V14"));
    }

    #[test]
    fn error_response_carries_kind() {
        let response = ErrorResponse::from(&FraudError::FitBeforeTransform);
        assert_eq!(response.error, "fit_before_transform");
    }
}

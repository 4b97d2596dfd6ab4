use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// One concrete assignment of hyper-parameters, keyed by parameter name.
pub type ParamSet = BTreeMap<String, f64>;

/// Hyper-parameter choices to search, keyed by parameter name.
///
/// Keys are kept sorted so the expanded combinations always come out in the
/// same order.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct ParamGrid(BTreeMap<String, Vec<f64>>);

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, values: Vec<f64>) -> Self {
        self.0.insert(name.to_string(), values);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cartesian product of all choices. An empty grid yields one empty set.
    pub fn combinations(&self) -> Vec<ParamSet> {
        let mut combos = vec![ParamSet::new()];
        for (name, values) in &self.0 {
            combos = combos
                .iter()
                .flat_map(|base| {
                    values.iter().map(move |&v| {
                        let mut next = base.clone();
                        next.insert(name.clone(), v);
                        next
                    })
                })
                .collect();
        }
        combos
    }
}

/// Central configuration for models in the crate.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub learning_rate: f32,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    LogisticRegression {
        /// Inverse L2 regularization strength.
        c: f64,
        max_iter: usize,
        tol: f64,
        /// Reweight classes inversely to their frequency.
        balanced: bool,
    },
    LinearSVM {
        c: f64,
        max_iter: usize,
        balanced: bool,
    },
    GBDT {
        max_depth: u32,
        num_boost_round: u32,
        debug: bool,
        training_optimization_level: u8,
        loss_type: String,
    },
    /// Predicts the training fraud rate for every row.
    Prior {},
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::GBDT {
            max_depth: 6,
            num_boost_round: 50,
            debug: false,
            training_optimization_level: 2,
            loss_type: "LogLikelyhood".to_string(),
        }
    }
}

impl ModelType {
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::LogisticRegression { .. } => "logistic_regression",
            ModelType::LinearSVM { .. } => "linear_svm",
            ModelType::GBDT { .. } => "gbdt",
            ModelType::Prior {} => "prior",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logistic_regression" | "logistic" => Ok(ModelType::LogisticRegression {
                c: 1.0,
                max_iter: 500,
                tol: 1e-6,
                balanced: true,
            }),
            "linear_svm" | "svm" => Ok(ModelType::LinearSVM {
                c: 1.0,
                max_iter: 500,
                balanced: true,
            }),
            "gbdt" => Ok(ModelType::default()),
            "prior" => Ok(ModelType::Prior {}),
            _ => Err(format!(
                "Unknown model type: {}. Expected one of: logistic_regression, linear_svm, gbdt, prior",
                s
            )),
        }
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> ClassifierError {
    ClassifierError::InvalidParameter {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn positive(name: &str, value: f64) -> Result<f64, ClassifierError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(invalid(name, format!("must be positive, got {}", value)))
    }
}

/// Positive integer that fits in a `u32`.
fn count(name: &str, value: f64) -> Result<usize, ClassifierError> {
    if value.is_finite() && (1.0..=f64::from(u32::MAX)).contains(&value) && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(invalid(
            name,
            format!("must be an integer between 1 and {}, got {}", u32::MAX, value),
        ))
    }
}

fn level(name: &str, value: f64) -> Result<u8, ClassifierError> {
    if (0.0..=2.0).contains(&value) && value.fract() == 0.0 {
        Ok(value as u8)
    } else {
        Err(invalid(name, format!("must be 0, 1 or 2, got {}", value)))
    }
}

fn flag(name: &str, value: f64) -> Result<bool, ClassifierError> {
    match value {
        v if v == 0.0 => Ok(false),
        v if v == 1.0 => Ok(true),
        v => Err(invalid(name, format!("must be 0 or 1, got {}", v))),
    }
}

impl ModelConfig {
    pub fn new(learning_rate: f32, model_type: ModelType) -> Self {
        Self {
            learning_rate,
            model_type,
        }
    }

    /// Check every hyper-parameter is usable before training starts.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        positive("learning_rate", f64::from(self.learning_rate))?;
        match &self.model_type {
            ModelType::LogisticRegression { c, max_iter, tol, .. } => {
                positive("c", *c)?;
                count("max_iter", *max_iter as f64)?;
                positive("tol", *tol)?;
            }
            ModelType::LinearSVM { c, max_iter, .. } => {
                positive("c", *c)?;
                count("max_iter", *max_iter as f64)?;
            }
            ModelType::GBDT {
                max_depth,
                num_boost_round,
                loss_type,
                ..
            } => {
                count("max_depth", f64::from(*max_depth))?;
                count("num_boost_round", f64::from(*num_boost_round))?;
                if loss_type != "LogLikelyhood" {
                    return Err(invalid(
                        "loss_type",
                        format!("only LogLikelyhood yields fraud probabilities, got {}", loss_type),
                    ));
                }
            }
            ModelType::Prior {} => {}
        }
        Ok(())
    }

    /// Return a copy with the named hyper-parameters replaced.
    pub fn with_params(&self, params: &ParamSet) -> Result<Self, ClassifierError> {
        let mut next = self.clone();
        for (name, &value) in params {
            if name == "learning_rate" {
                next.learning_rate = positive(name, value)? as f32;
                continue;
            }
            match (&mut next.model_type, name.as_str()) {
                (ModelType::LogisticRegression { c, .. }, "c")
                | (ModelType::LinearSVM { c, .. }, "c") => *c = positive(name, value)?,
                (ModelType::LogisticRegression { max_iter, .. }, "max_iter")
                | (ModelType::LinearSVM { max_iter, .. }, "max_iter") => {
                    *max_iter = count(name, value)?
                }
                (ModelType::LogisticRegression { tol, .. }, "tol") => *tol = positive(name, value)?,
                (ModelType::LogisticRegression { balanced, .. }, "balanced")
                | (ModelType::LinearSVM { balanced, .. }, "balanced") => {
                    *balanced = flag(name, value)?
                }
                (ModelType::GBDT { max_depth, .. }, "max_depth") => {
                    *max_depth = count(name, value)? as u32
                }
                (ModelType::GBDT { num_boost_round, .. }, "num_boost_round") => {
                    *num_boost_round = count(name, value)? as u32
                }
                (
                    ModelType::GBDT {
                        training_optimization_level,
                        ..
                    },
                    "training_optimization_level",
                ) => *training_optimization_level = level(name, value)?,
                (model_type, _) => {
                    return Err(invalid(
                        name,
                        format!("not a parameter of {}", model_type.name()),
                    ))
                }
            }
        }
        Ok(next)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            model_type: ModelType::default(),
        }
    }
}

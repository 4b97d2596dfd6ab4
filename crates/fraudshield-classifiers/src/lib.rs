//! fraudshield-classifiers: preprocessing, model selection and scoring for
//! card-transaction fraud detection.
//!
//! The crate provides a median-impute / standard-scale feature preprocessor,
//! a small set of estimator wrappers behind the [`models::Scoreable`] trait,
//! a grid-searching model selector ranked by ROC AUC, JSON artifact I/O, and
//! an immutable inference context for scoring single transactions.
pub mod config;
pub mod cross_validation;
pub mod data_handling;
pub mod error;
pub mod inference;
pub mod io;
pub mod model_selection;
pub mod models;
pub mod preprocessing;
pub mod report;
pub mod stats;

pub use error::{FraudError, Result};

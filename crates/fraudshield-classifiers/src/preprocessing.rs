//! Column-wise feature preprocessing.
//!
//! `FeaturePreprocessor` imputes missing values with the training median and
//! standardizes the scaled columns (`Time`, `Amount` by default). Every other
//! column is already decorrelated and is copied through untouched. Output
//! columns are the scaled columns first, then the passthrough columns in the
//! order seen during `fit`.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

use crate::data_handling::FeatureFrame;
use crate::error::{FraudError, Result};

/// Columns rescaled to zero mean and unit variance.
pub const SCALED_COLUMNS: [&str; 2] = ["Time", "Amount"];

/// Statistics learned for one scaled column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub name: String,
    /// Fill value for missing entries.
    pub median: f64,
    pub mean: f64,
    /// Population standard deviation of the imputed column, floored at `MIN_STD`.
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedState {
    scaled: Vec<ColumnStatistics>,
    passthrough: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePreprocessor {
    scaled_columns: Vec<String>,
    state: Option<FittedState>,
}

impl Default for FeaturePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeaturePreprocessor {
    /// Zero-variance columns are divided by this instead of their std.
    pub const MIN_STD: f64 = 1.0;

    pub fn new() -> Self {
        Self::with_scaled_columns(SCALED_COLUMNS.iter().map(|c| c.to_string()).collect())
    }

    pub fn with_scaled_columns(scaled_columns: Vec<String>) -> Self {
        Self {
            scaled_columns,
            state: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn scaled_statistics(&self) -> Option<&[ColumnStatistics]> {
        self.state.as_ref().map(|s| s.scaled.as_slice())
    }

    pub fn passthrough_columns(&self) -> Option<&[String]> {
        self.state.as_ref().map(|s| s.passthrough.as_slice())
    }

    /// Names of the transformed columns, in output order.
    pub fn output_columns(&self) -> Result<Vec<String>> {
        let state = self.state.as_ref().ok_or(FraudError::FitBeforeTransform)?;
        Ok(state
            .scaled
            .iter()
            .map(|s| s.name.clone())
            .chain(state.passthrough.iter().cloned())
            .collect())
    }

    /// Learn imputation and scaling statistics from the scaled columns.
    ///
    /// A preprocessor is fitted exactly once; fitting again is rejected so a
    /// persisted preprocessor can never drift from the data it was built on.
    pub fn fit(&mut self, frame: &FeatureFrame) -> Result<&mut Self> {
        if self.state.is_some() {
            return Err(FraudError::AlreadyFitted);
        }

        let mut scaled = Vec::with_capacity(self.scaled_columns.len());
        for name in &self.scaled_columns {
            let column = frame
                .column(name)
                .ok_or_else(|| FraudError::Schema(format!("Expected column '{}' is missing", name)))?;

            let observed: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
            if observed.is_empty() {
                return Err(FraudError::Schema(format!(
                    "Column '{}' has no observed values",
                    name
                )));
            }
            if observed.iter().any(|v| v.is_infinite()) {
                return Err(FraudError::Schema(format!(
                    "Column '{}' contains infinite values",
                    name
                )));
            }

            let median = Data::new(observed).median();
            let imputed: Vec<f64> = column
                .iter()
                .map(|&v| if v.is_nan() { median } else { v })
                .collect();
            let mean = imputed.iter().mean();
            let mut std = imputed.iter().population_std_dev();
            if !(std > 0.0) {
                log::warn!(
                    "Column '{}' has zero variance; scaling with std = {}",
                    name,
                    Self::MIN_STD
                );
                std = Self::MIN_STD;
            }

            log::debug!(
                "Fitted '{}': median={:.6}, mean={:.6}, std={:.6}",
                name,
                median,
                mean,
                std
            );
            scaled.push(ColumnStatistics {
                name: name.clone(),
                median,
                mean,
                std,
            });
        }

        let passthrough: Vec<String> = frame
            .columns()
            .iter()
            .filter(|c| !self.scaled_columns.contains(*c))
            .cloned()
            .collect();

        log::info!("Scaling columns: {:?}", self.scaled_columns);
        log::info!("Passing through {} columns", passthrough.len());

        self.state = Some(FittedState { scaled, passthrough });
        Ok(self)
    }

    /// Apply the stored statistics. Never refits.
    pub fn transform(&self, frame: &FeatureFrame) -> Result<FeatureFrame> {
        let state = self.state.as_ref().ok_or(FraudError::FitBeforeTransform)?;

        let lookup = |name: &str| {
            frame
                .column_index(name)
                .ok_or_else(|| FraudError::Schema(format!("Expected column '{}' is missing", name)))
        };
        let scaled_idx = state
            .scaled
            .iter()
            .map(|s| lookup(s.name.as_str()))
            .collect::<Result<Vec<_>>>()?;
        let passthrough_idx = state
            .passthrough
            .iter()
            .map(|name| lookup(name.as_str()))
            .collect::<Result<Vec<_>>>()?;

        let nrows = frame.nrows();
        let ncols = scaled_idx.len() + passthrough_idx.len();
        let input = frame.values();
        let mut out = Array2::<f64>::zeros((nrows, ncols));

        for r in 0..nrows {
            for (c, (stats, &src)) in state.scaled.iter().zip(&scaled_idx).enumerate() {
                let v = input[(r, src)];
                let v = if v.is_nan() { stats.median } else { v };
                out[(r, c)] = (v - stats.mean) / stats.std;
            }
            for (c, &src) in passthrough_idx.iter().enumerate() {
                out[(r, scaled_idx.len() + c)] = input[(r, src)];
            }
        }

        FeatureFrame::new(self.output_columns()?, out)
    }

    pub fn fit_transform(&mut self, frame: &FeatureFrame) -> Result<FeatureFrame> {
        self.fit(frame)?;
        self.transform(frame)
    }
}

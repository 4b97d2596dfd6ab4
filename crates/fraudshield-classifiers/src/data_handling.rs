//! Data structures and helpers for labeled transaction datasets.
//!
//! This module defines `FeatureFrame` (named numeric columns) and `Dataset`
//! (features plus a 0/1 label per row) and contains the stratified
//! train/test split used by the training pipeline.
use std::collections::BTreeMap;

use ndarray::{concatenate, Array1, Array2, ArrayView1, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{FraudError, Result};

/// One binary label (0 = legitimate, 1 = fraud) per row.
pub type LabelVector = Array1<u8>;

/// Name of the label column in the raw transaction table.
pub const TARGET_COLUMN: &str = "Class";

/// A table of `f64` columns with stable names. Missing values are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureFrame {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(FraudError::Schema(format!(
                "{} column names for {} value columns",
                columns.len(),
                values.ncols()
            )));
        }
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(FraudError::Schema(format!("Duplicate column '{}'", name)));
            }
        }
        Ok(Self { columns, values })
    }

    /// Build a frame from row-major records.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let ncols = columns.len();
        let nrows = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
            return Err(FraudError::Schema(format!(
                "Row {} has {} values, expected {}",
                i,
                row.len(),
                ncols
            )));
        }
        let values = Array2::from_shape_vec((nrows, ncols), rows.into_iter().flatten().collect())
            .map_err(|e| FraudError::Schema(e.to_string()))?;
        Self::new(columns, values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name).map(|idx| self.values.column(idx))
    }

    pub fn select_rows(&self, indices: &[usize]) -> FeatureFrame {
        FeatureFrame {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }
}

/// Features plus aligned labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub features: FeatureFrame,
    pub labels: LabelVector,
}

impl Dataset {
    pub fn new(features: FeatureFrame, labels: LabelVector) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(FraudError::Schema(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l > 1) {
            return Err(FraudError::Schema(format!(
                "Labels must be 0 or 1, found {}",
                bad
            )));
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Row count per class, ordered by class.
    pub fn class_counts(&self) -> BTreeMap<u8, usize> {
        let mut counts = BTreeMap::new();
        for &label in self.labels.iter() {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: self.features.select_rows(indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }

    /// Feature matrix with the label appended as the last column.
    pub fn to_training_array(&self) -> Array2<f64> {
        let labels = self.labels.mapv(f64::from).insert_axis(Axis(1));
        concatenate![Axis(1), self.features.values().view(), labels.view()]
    }

    pub fn log_input_data_summary(&self) {
        let counts = self.class_counts();
        log::info!("----- Input Data Summary -----");
        log::info!(
            "Dataset shape: ({}, {})",
            self.len(),
            self.features.ncols() + 1
        );
        log::info!(
            "{} legitimate and {} fraudulent transactions",
            counts.get(&0).copied().unwrap_or(0),
            counts.get(&1).copied().unwrap_or(0)
        );
        log::info!("-------------------------------");
    }
}

/// Stratified train/test split.
///
/// Each class is shuffled independently with a seeded RNG and
/// `round(n_class * test_size)` of its rows go to the test split. Classes with
/// at least two rows always keep one row on each side. Both splits keep the
/// original row order.
pub fn stratified_split(dataset: &Dataset, test_size: f64, seed: u64) -> Result<(Dataset, Dataset)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(FraudError::Config(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    if dataset.len() < 2 {
        return Err(FraudError::Schema(format!(
            "Need at least 2 rows to split, got {}",
            dataset.len()
        )));
    }

    let mut class_indices: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in dataset.labels.iter().enumerate() {
        class_indices.entry(label).or_default().push(idx);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();

    for (class, indices) in class_indices.iter_mut() {
        indices.shuffle(&mut rng);
        let n = indices.len();
        let mut n_test = (n as f64 * test_size).round() as usize;
        if n >= 2 {
            n_test = n_test.clamp(1, n - 1);
        }
        log::trace!("Class {}: {} test rows of {}", class, n_test, n);
        test_idx.extend_from_slice(&indices[..n_test]);
        train_idx.extend_from_slice(&indices[n_test..]);
    }

    train_idx.sort_unstable();
    test_idx.sort_unstable();

    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(FraudError::Schema(
            "Split produced an empty train or test set".to_string(),
        ));
    }

    Ok((dataset.select_rows(&train_idx), dataset.select_rows(&test_idx)))
}

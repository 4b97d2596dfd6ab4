//! Stratified k-fold splitting for hyper-parameter search.

use std::collections::BTreeMap;

use ndarray::ArrayView1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CvSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified K-Fold: every fold keeps the class distribution of the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub random_state: Option<u64>,
}

impl Default for StratifiedKFold {
    fn default() -> Self {
        Self {
            n_splits: 3,
            shuffle: true,
            random_state: Some(42),
        }
    }
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            ..Self::default()
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Generate train/test splits.
    ///
    /// Every class must have at least `n_splits` members so each test fold
    /// sees every class and the fold metric stays defined.
    pub fn split(&self, y: ArrayView1<'_, u8>) -> Result<Vec<CvSplit>, ClassifierError> {
        if self.n_splits < 2 {
            return Err(ClassifierError::InvalidParameter {
                name: "n_splits".to_string(),
                reason: format!("must be at least 2, got {}", self.n_splits),
            });
        }

        let mut class_indices: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in y.iter().enumerate() {
            class_indices.entry(label).or_default().push(idx);
        }
        if class_indices.len() < 2 {
            return Err(ClassifierError::Training(
                "stratified folds need both classes in the training labels".to_string(),
            ));
        }
        if let Some((class, members)) = class_indices
            .iter()
            .find(|(_, members)| members.len() < self.n_splits)
        {
            return Err(ClassifierError::Training(format!(
                "class {} has {} member(s), fewer than n_splits = {}",
                class,
                members.len(),
                self.n_splits
            )));
        }

        if self.shuffle {
            let mut rng = match self.random_state {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        for indices in class_indices.values() {
            for (i, &idx) in indices.iter().enumerate() {
                folds[i % self.n_splits].push(idx);
            }
        }
        for fold in folds.iter_mut() {
            fold.sort_unstable();
        }

        let splits = (0..self.n_splits)
            .map(|fold_idx| {
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CvSplit {
                    train_indices,
                    test_indices: folds[fold_idx].clone(),
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

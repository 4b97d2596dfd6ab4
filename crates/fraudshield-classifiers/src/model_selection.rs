//! Candidate evaluation and best-model selection.
//!
//! Every candidate is fitted on the training split, optionally after a grid
//! search under stratified k-fold cross-validation, then ranked by ROC AUC on
//! the held-out split. A candidate that errors or panics is recorded with
//! [`FAILED_SCORE`] and the run moves on to the next one.

use std::any::Any;
use std::collections::HashSet;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{ModelConfig, ParamGrid, ParamSet};
use crate::cross_validation::{CvSplit, StratifiedKFold};
use crate::error::{FraudError, Result};
use crate::models::build_model;
use crate::models::classifier_trait::Classifier;
use crate::stats::roc_auc;

/// Score recorded for a candidate that failed. Below any valid ROC AUC.
pub const FAILED_SCORE: f64 = -1.0;

/// A named estimator plus the hyper-parameter choices to search.
pub struct CandidateModel {
    pub name: String,
    pub estimator: Box<dyn Classifier>,
    pub param_grid: ParamGrid,
}

impl CandidateModel {
    pub fn new(name: impl Into<String>, estimator: Box<dyn Classifier>) -> Self {
        CandidateModel {
            name: name.into(),
            estimator,
            param_grid: ParamGrid::new(),
        }
    }

    pub fn from_config(name: impl Into<String>, config: ModelConfig) -> Self {
        Self::new(name, build_model(config))
    }

    pub fn with_param_grid(mut self, param_grid: ParamGrid) -> Self {
        self.param_grid = param_grid;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Scored {
        /// ROC AUC on the held-out split.
        score: f64,
        best_params: ParamSet,
        /// Mean fold ROC AUC of `best_params`, when a search ran.
        cv_score: Option<f64>,
    },
    Failed {
        reason: String,
    },
}

impl CandidateOutcome {
    pub fn score(&self) -> f64 {
        match self {
            CandidateOutcome::Scored { score, .. } => *score,
            CandidateOutcome::Failed { .. } => FAILED_SCORE,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CandidateOutcome::Failed { .. })
    }
}

pub struct CandidateResult {
    pub name: String,
    pub outcome: CandidateOutcome,
    /// Fitted estimator; `None` when the candidate failed.
    pub trained: Option<Box<dyn Classifier>>,
    /// Held-out scores of the fitted estimator.
    pub test_scores: Option<Array1<f64>>,
}

/// The winning candidate, detached from its report.
pub struct BestCandidate {
    pub name: String,
    pub score: f64,
    pub best_params: ParamSet,
    pub model: Box<dyn Classifier>,
    pub test_scores: Array1<f64>,
}

/// One entry per input candidate, in input order.
#[derive(Default)]
pub struct EvaluationReport {
    results: Vec<CandidateResult>,
}

impl EvaluationReport {
    pub fn results(&self) -> &[CandidateResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Score of the named candidate, [`FAILED_SCORE`] if it failed.
    pub fn score(&self, name: &str) -> Option<f64> {
        self.get(name).map(|r| r.outcome.score())
    }

    pub fn scores(&self) -> Vec<(&str, f64)> {
        self.results
            .iter()
            .map(|r| (r.name.as_str(), r.outcome.score()))
            .collect()
    }

    /// Fitted estimators by candidate name; failed candidates map to `None`.
    pub fn trained_models(&self) -> Vec<(&str, Option<&dyn Classifier>)> {
        self.results
            .iter()
            .map(|r| (r.name.as_str(), r.trained.as_deref()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&CandidateResult> {
        self.results.iter().find(|r| r.name == name)
    }

    fn best_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, result) in self.results.iter().enumerate() {
            if let CandidateOutcome::Scored { score, .. } = result.outcome {
                // strict comparison keeps the first candidate on ties
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((i, score));
                }
            }
        }
        best.map(|(i, _)| i)
    }

    /// Highest scoring candidate that did not fail.
    pub fn best(&self) -> Option<&CandidateResult> {
        self.best_index().map(|i| &self.results[i])
    }

    pub fn into_best(mut self) -> Result<BestCandidate> {
        let attempted = self.results.len();
        let idx = self
            .best_index()
            .ok_or(FraudError::AllCandidatesFailed { attempted })?;
        let result = self.results.swap_remove(idx);
        match (result.outcome, result.trained, result.test_scores) {
            (
                CandidateOutcome::Scored {
                    score, best_params, ..
                },
                Some(model),
                Some(test_scores),
            ) => Ok(BestCandidate {
                name: result.name,
                score,
                best_params,
                model,
                test_scores,
            }),
            _ => Err(FraudError::AllCandidatesFailed { attempted }),
        }
    }
}

struct Fitted {
    model: Box<dyn Classifier>,
    best_params: ParamSet,
    cv_score: Option<f64>,
    score: f64,
    test_scores: Array1<f64>,
}

fn reason<E: Display>(e: E) -> String {
    e.to_string()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Runs the evaluate-and-select loop over a batch of candidates.
#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    pub cv: StratifiedKFold,
}

impl ModelSelector {
    pub fn new(cv: StratifiedKFold) -> Self {
        ModelSelector { cv }
    }

    /// Fit, search and score every candidate.
    ///
    /// Only malformed input aborts the batch: mismatched row counts or feature
    /// widths (`Schema`) and duplicate candidate names (`Config`). Anything a
    /// single candidate does wrong ends up in its report entry.
    pub fn evaluate(
        &self,
        x_train: ArrayView2<'_, f64>,
        y_train: ArrayView1<'_, u8>,
        x_test: ArrayView2<'_, f64>,
        y_test: ArrayView1<'_, u8>,
        candidates: Vec<CandidateModel>,
    ) -> Result<EvaluationReport> {
        if x_train.nrows() != y_train.len() {
            return Err(FraudError::Schema(format!(
                "Training features have {} rows but {} labels",
                x_train.nrows(),
                y_train.len()
            )));
        }
        if x_test.nrows() != y_test.len() {
            return Err(FraudError::Schema(format!(
                "Test features have {} rows but {} labels",
                x_test.nrows(),
                y_test.len()
            )));
        }
        if x_train.ncols() != x_test.ncols() {
            return Err(FraudError::Schema(format!(
                "Training features have {} columns but test features have {}",
                x_train.ncols(),
                x_test.ncols()
            )));
        }
        for (split, labels) in [("Training", y_train.view()), ("Test", y_test.view())] {
            if let Some(&label) = labels.iter().find(|&&l| l > 1) {
                return Err(FraudError::Schema(format!(
                    "{} labels must be 0 or 1, found {}",
                    split, label
                )));
            }
        }
        let mut seen = HashSet::new();
        for candidate in &candidates {
            if !seen.insert(candidate.name.as_str()) {
                return Err(FraudError::Config(format!(
                    "Duplicate candidate name '{}'",
                    candidate.name
                )));
            }
        }

        log::debug!("Model selection: Created ({} candidates)", candidates.len());
        let test_labels = y_test.to_vec();
        let mut report = EvaluationReport::default();

        for candidate in candidates {
            let name = candidate.name.clone();
            log::debug!("Model selection: Fitting({})", name);

            let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
                self.fit_candidate(candidate, x_train, y_train, x_test, &test_labels)
            }))
            .unwrap_or_else(|payload| Err(panic_message(payload)));

            let result = match attempt {
                Ok(fitted) => {
                    log::info!("Model: {} | ROC AUC: {:.4}", name, fitted.score);
                    CandidateResult {
                        name: name.clone(),
                        outcome: CandidateOutcome::Scored {
                            score: fitted.score,
                            best_params: fitted.best_params,
                            cv_score: fitted.cv_score,
                        },
                        trained: Some(fitted.model),
                        test_scores: Some(fitted.test_scores),
                    }
                }
                Err(reason) => {
                    log::warn!(
                        "{}",
                        FraudError::CandidateFit {
                            candidate: name.clone(),
                            reason: reason.clone(),
                        }
                    );
                    CandidateResult {
                        name: name.clone(),
                        outcome: CandidateOutcome::Failed { reason },
                        trained: None,
                        test_scores: None,
                    }
                }
            };
            log::debug!(
                "Model selection: Scored({}) = {}",
                name,
                result.outcome.score()
            );
            report.results.push(result);
        }

        log::debug!("Model selection: Reported");
        Ok(report)
    }

    fn fit_candidate(
        &self,
        candidate: CandidateModel,
        x_train: ArrayView2<'_, f64>,
        y_train: ArrayView1<'_, u8>,
        x_test: ArrayView2<'_, f64>,
        test_labels: &[u8],
    ) -> std::result::Result<Fitted, String> {
        let combos = candidate.param_grid.combinations();
        let (mut model, best_params, cv_score) = match combos.len() {
            0 => return Err("parameter grid has a parameter with no values".to_string()),
            1 => {
                let params = combos.into_iter().next().unwrap_or_default();
                let model = if params.is_empty() {
                    candidate.estimator
                } else {
                    candidate.estimator.with_params(&params).map_err(reason)?
                };
                (model, params, None)
            }
            n => {
                log::debug!("Grid search for '{}' over {} parameter sets", candidate.name, n);
                let splits = self.cv.split(y_train).map_err(reason)?;
                let estimator = &*candidate.estimator;
                let cv_scores: Vec<std::result::Result<f64, String>> = combos
                    .par_iter()
                    .map(|params| cross_validate(estimator, params, x_train, y_train, &splits))
                    .collect();

                let mut best: Option<(usize, f64)> = None;
                let mut first_error = None;
                for (i, cv) in cv_scores.into_iter().enumerate() {
                    match cv {
                        Ok(score) => {
                            log::trace!("{} {:?}: mean CV ROC AUC {:.6}", candidate.name, combos[i], score);
                            if best.map_or(true, |(_, b)| score > b) {
                                best = Some((i, score));
                            }
                        }
                        Err(e) => {
                            log::debug!("{} {:?}: {}", candidate.name, combos[i], e);
                            first_error.get_or_insert(e);
                        }
                    }
                }
                let (idx, cv_score) = best.ok_or_else(|| {
                    first_error.unwrap_or_else(|| "no parameter set could be evaluated".to_string())
                })?;
                let params = combos[idx].clone();
                let model = candidate.estimator.with_params(&params).map_err(reason)?;
                (model, params, Some(cv_score))
            }
        };

        model.fit(x_train, y_train).map_err(reason)?;
        let test_scores = model.score_batch(x_test).map_err(reason)?;
        let score = roc_auc(test_labels, &test_scores.to_vec()).map_err(reason)?;

        Ok(Fitted {
            model,
            best_params,
            cv_score,
            score,
            test_scores,
        })
    }
}

/// Mean fold ROC AUC of one parameter set.
fn cross_validate(
    estimator: &dyn Classifier,
    params: &ParamSet,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, u8>,
    splits: &[CvSplit],
) -> std::result::Result<f64, String> {
    let mut total = 0.0;
    for split in splits {
        let mut model = estimator.with_params(params).map_err(reason)?;
        let x_fit = x.select(Axis(0), &split.train_indices);
        let y_fit = y.select(Axis(0), &split.train_indices);
        model.fit(x_fit.view(), y_fit.view()).map_err(reason)?;

        let x_val = x.select(Axis(0), &split.test_indices);
        let y_val: Vec<u8> = split.test_indices.iter().map(|&i| y[i]).collect();
        let scores = model.score_batch(x_val.view()).map_err(reason)?;
        let fold = roc_auc(&y_val, &scores.to_vec())
            .map_err(|e| format!("fold {}: {}", split.fold_idx, e))?;
        total += fold;
    }
    Ok(total / splits.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelType;
    use crate::error::ClassifierError;
    use crate::models::classifier_trait::sigmoid;
    use crate::models::{ScoreKind, Scoreable};
    use ndarray::{array, Array2};

    /// Scores a row by one of its columns, picked through the `column` parameter.
    struct ColumnScorer {
        column: usize,
        fitted: bool,
    }

    impl Scoreable for ColumnScorer {
        fn score(&self, features: ArrayView1<'_, f64>) -> std::result::Result<f64, ClassifierError> {
            if !self.fitted {
                return Err(ClassifierError::NotFitted);
            }
            Ok(sigmoid(features[self.column]))
        }

        fn score_kind(&self) -> ScoreKind {
            ScoreKind::Probability
        }
    }

    impl Classifier for ColumnScorer {
        fn name(&self) -> &str {
            "column"
        }

        fn fit(
            &mut self,
            x: ArrayView2<'_, f64>,
            _y: ArrayView1<'_, u8>,
        ) -> std::result::Result<(), ClassifierError> {
            if self.column >= x.ncols() {
                return Err(ClassifierError::Training(format!("no column {}", self.column)));
            }
            self.fitted = true;
            Ok(())
        }

        fn with_params(
            &self,
            params: &ParamSet,
        ) -> std::result::Result<Box<dyn Classifier>, ClassifierError> {
            let column = params.get("column").map_or(self.column, |&c| c as usize);
            Ok(Box::new(ColumnScorer {
                column,
                fitted: false,
            }))
        }
    }

    /// Columns: perfect signal, inverted signal, noisy signal, copy of the first.
    fn graded_data() -> (Array2<f64>, Array1<u8>) {
        let y: Array1<u8> = (0..12).map(|i| u8::from(i >= 6)).collect();
        let x = Array2::from_shape_fn((12, 4), |(i, j)| {
            let label = f64::from(y[i]);
            match j {
                0 | 3 => label,
                1 => 1.0 - label,
                _ => (i % 4) as f64 + 2.0 * label,
            }
        });
        (x, y)
    }

    fn column_search(values: Vec<f64>) -> CandidateModel {
        CandidateModel::new(
            "column",
            Box::new(ColumnScorer {
                column: 0,
                fitted: false,
            }),
        )
        .with_param_grid(ParamGrid::new().with("column", values))
    }

    fn searched(report: &EvaluationReport) -> (f64, Option<f64>) {
        match &report.get("column").unwrap().outcome {
            CandidateOutcome::Scored {
                best_params,
                cv_score,
                ..
            } => (best_params["column"], *cv_score),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    fn data() -> (Array2<f64>, Array1<u8>) {
        let x = Array2::from_shape_fn((12, 2), |(i, j)| {
            if j == 0 {
                i as f64
            } else {
                (i % 3) as f64
            }
        });
        let y: Array1<u8> = (0..12).map(|i| u8::from(i >= 6)).collect();
        (x, y)
    }

    fn prior() -> ModelConfig {
        ModelConfig::new(0.1, ModelType::Prior {})
    }

    #[test]
    fn ties_go_to_the_first_candidate() {
        let (x, y) = data();
        let report = ModelSelector::default()
            .evaluate(
                x.view(),
                y.view(),
                x.view(),
                y.view(),
                vec![
                    CandidateModel::from_config("a", prior()),
                    CandidateModel::from_config("b", prior()),
                ],
            )
            .unwrap();
        assert_eq!(report.score("a"), Some(0.5));
        assert_eq!(report.best().unwrap().name, "a");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (x, y) = data();
        let result = ModelSelector::default().evaluate(
            x.view(),
            y.view(),
            x.view(),
            y.view(),
            vec![
                CandidateModel::from_config("a", prior()),
                CandidateModel::from_config("a", prior()),
            ],
        );
        assert!(matches!(result, Err(FraudError::Config(_))));
    }

    #[test]
    fn mismatched_labels_are_a_schema_error() {
        let (x, y) = data();
        let short = array![0u8, 1];
        let result = ModelSelector::default().evaluate(
            x.view(),
            short.view(),
            x.view(),
            y.view(),
            vec![CandidateModel::from_config("a", prior())],
        );
        assert!(matches!(result, Err(FraudError::Schema(_))));
    }

    #[test]
    fn empty_choice_list_fails_only_that_candidate() {
        let (x, y) = data();
        let report = ModelSelector::default()
            .evaluate(
                x.view(),
                y.view(),
                x.view(),
                y.view(),
                vec![
                    CandidateModel::from_config(
                        "empty",
                        ModelConfig::new(0.1, "logistic".parse().unwrap()),
                    )
                    .with_param_grid(ParamGrid::new().with("c", vec![])),
                    CandidateModel::from_config("prior", prior()),
                ],
            )
            .unwrap();
        assert_eq!(report.score("empty"), Some(FAILED_SCORE));
        assert_eq!(report.best().unwrap().name, "prior");
    }

    #[test]
    fn grid_search_records_best_params() {
        let (x, y) = data();
        let config = ModelConfig::new(0.5, "logistic".parse().unwrap());
        let report = ModelSelector::default()
            .evaluate(
                x.view(),
                y.view(),
                x.view(),
                y.view(),
                vec![CandidateModel::from_config("lr", config)
                    .with_param_grid(ParamGrid::new().with("c", vec![0.1, 1.0]))],
            )
            .unwrap();
        match &report.get("lr").unwrap().outcome {
            CandidateOutcome::Scored {
                best_params,
                cv_score,
                ..
            } => {
                assert!(best_params.contains_key("c"));
                assert!(cv_score.is_some());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn grid_search_picks_highest_mean_fold_auc() {
        let (x, y) = graded_data();
        let selector = ModelSelector::default();
        let report = selector
            .evaluate(x.view(), y.view(), x.view(), y.view(), vec![column_search(vec![1.0, 2.0])])
            .unwrap();
        let (column, cv_score) = searched(&report);
        assert_eq!(column, 2.0);

        let splits = selector.cv.split(y.view()).unwrap();
        let expected = splits
            .iter()
            .map(|split| {
                let labels: Vec<u8> = split.test_indices.iter().map(|&i| y[i]).collect();
                let scores: Vec<f64> = split.test_indices.iter().map(|&i| sigmoid(x[[i, 2]])).collect();
                roc_auc(&labels, &scores).unwrap()
            })
            .sum::<f64>()
            / splits.len() as f64;
        assert!((cv_score.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn grid_search_ties_keep_grid_order() {
        let (x, y) = graded_data();
        let report = ModelSelector::default()
            .evaluate(x.view(), y.view(), x.view(), y.view(), vec![column_search(vec![3.0, 0.0])])
            .unwrap();
        assert_eq!(searched(&report), (3.0, Some(1.0)));
    }

    #[test]
    fn failing_parameter_set_leaves_the_others_in_play() {
        let (x, y) = graded_data();
        let report = ModelSelector::default()
            .evaluate(x.view(), y.view(), x.view(), y.view(), vec![column_search(vec![9.0, 2.0])])
            .unwrap();
        let (column, cv_score) = searched(&report);
        assert_eq!(column, 2.0);
        assert!(cv_score.unwrap() > 0.5);
        assert!(report.score("column").unwrap() > 0.5);
    }

    #[test]
    fn non_binary_labels_are_a_schema_error() {
        let x = Array2::from_shape_fn((9, 2), |(i, j)| (i + j) as f64);
        let y = array![0u8, 0, 0, 1, 1, 1, 2, 2, 2];
        let result = ModelSelector::default().evaluate(
            x.view(),
            y.view(),
            x.view(),
            y.view(),
            vec![CandidateModel::from_config("p", prior())],
        );
        assert!(matches!(result, Err(FraudError::Schema(msg)) if msg.contains("0 or 1")));
    }

    #[test]
    fn all_failed_report_has_no_best() {
        let (x, y) = data();
        let ones = Array1::from_elem(12, 1u8);
        let report = ModelSelector::default()
            .evaluate(
                x.view(),
                y.view(),
                x.view(),
                ones.view(),
                vec![CandidateModel::from_config("a", prior())],
            )
            .unwrap();
        assert!(report.best().is_none());
        assert!(matches!(
            report.into_best(),
            Err(FraudError::AllCandidatesFailed { attempted: 1 })
        ));
    }
}

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use fraudshield_classifiers::config::{ModelConfig, ModelType, ParamGrid};
use fraudshield_classifiers::data_handling::TARGET_COLUMN;
use fraudshield_classifiers::model_selection::CandidateModel;

use crate::util::validate_csv_file;

/// One model family to evaluate, with the grid to search over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateConfig {
    pub name: String,
    pub model: ModelConfig,
    #[serde(default)]
    pub param_grid: ParamGrid,
}

impl CandidateConfig {
    pub fn to_candidate(&self) -> CandidateModel {
        CandidateModel::from_config(self.name.clone(), self.model.clone())
            .with_param_grid(self.param_grid.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub version: String,
    pub data_file: String,
    pub artifact_dir: String,
    pub target_column: String,
    pub test_size: f64,
    pub seed: u64,
    pub cv_folds: usize,
    pub candidates: Vec<CandidateConfig>,
    /// Refuse to persist a best model scoring below this ROC AUC.
    pub min_score: Option<f64>,
    pub write_report: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_file: String::from("data/processed/eda_done_data.csv"),
            artifact_dir: String::from("artifacts"),
            target_column: String::from(TARGET_COLUMN),
            test_size: 0.3,
            seed: 42,
            cv_folds: 3,
            candidates: default_candidates(),
            min_score: None,
            write_report: true,
        }
    }
}

fn default_candidates() -> Vec<CandidateConfig> {
    vec![
        CandidateConfig {
            name: String::from("Logistic Regression"),
            model: ModelConfig::new(
                0.5,
                ModelType::LogisticRegression {
                    c: 1.0,
                    max_iter: 500,
                    tol: 1e-6,
                    balanced: true,
                },
            ),
            param_grid: ParamGrid::new().with("c", vec![0.01, 0.1, 1.0, 10.0]),
        },
        CandidateConfig {
            name: String::from("Linear SVM"),
            model: ModelConfig::new(
                0.1,
                ModelType::LinearSVM {
                    c: 1.0,
                    max_iter: 500,
                    balanced: true,
                },
            ),
            param_grid: ParamGrid::new().with("c", vec![0.1, 1.0]),
        },
        CandidateConfig {
            name: String::from("Gradient Boosting"),
            model: ModelConfig::new(0.1, ModelType::default()),
            param_grid: ParamGrid::new()
                .with("max_depth", vec![3.0, 5.0])
                .with("num_boost_round", vec![50.0, 100.0]),
        },
    ]
}

pub fn load_train_config<P: AsRef<Path>>(path: P) -> Result<TrainConfig> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
    let config: TrainConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
    Ok(config)
}

impl TrainConfig {
    pub fn from_arguments(config_path: Option<&PathBuf>, matches: &ArgMatches) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => load_train_config(path)?,
            None => TrainConfig::default(),
        };

        // Apply CLI overrides
        if let Some(data_file) = matches.get_one::<String>("data_file") {
            config.data_file = data_file.clone();
        }

        if let Some(artifact_dir) = matches.get_one::<String>("artifact_dir") {
            config.artifact_dir = artifact_dir.clone();
        }

        if let Some(target_column) = matches.get_one::<String>("target_column") {
            config.target_column = target_column.clone();
        }

        if matches.get_flag("no_report") {
            config.write_report = false;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_csv_file(&self.data_file)?;
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            anyhow::bail!("test_size must be between 0 and 1, got {}", self.test_size);
        }
        if self.cv_folds < 2 {
            anyhow::bail!("cv_folds must be at least 2, got {}", self.cv_folds);
        }
        if self.candidates.is_empty() {
            anyhow::bail!("At least one candidate model must be configured");
        }
        for candidate in &self.candidates {
            candidate
                .model
                .validate()
                .with_context(|| format!("Invalid model for candidate '{}'", candidate.name))?;
        }
        Ok(())
    }
}

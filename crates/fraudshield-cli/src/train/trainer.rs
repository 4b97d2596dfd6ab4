use anyhow::{Context, Result};
use maud::html;
use serde::Serialize;
use std::path::{Path, PathBuf};

use fraudshield_classifiers::cross_validation::StratifiedKFold;
use fraudshield_classifiers::data_handling::stratified_split;
use fraudshield_classifiers::inference::PersistedModel;
use fraudshield_classifiers::io::{read_labeled_csv, save_object, write_labeled_csv, PREPROCESSOR_FILE};
use fraudshield_classifiers::model_selection::{BestCandidate, CandidateOutcome, ModelSelector};
use fraudshield_classifiers::preprocessing::FeaturePreprocessor;
use fraudshield_classifiers::report::plots::{plot_candidate_scores, plot_roc_curve, plot_score_histogram};
use fraudshield_classifiers::report::{Report, ReportSection};
use fraudshield_classifiers::stats::roc_curve;

use super::input::TrainConfig;

pub const RAW_FILE: &str = "raw.csv";
pub const TRAIN_FILE: &str = "train.csv";
pub const TEST_FILE: &str = "test.csv";
pub const REPORT_FILE: &str = "report.html";

#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    pub name: String,
    pub score: f64,
    pub outcome: CandidateOutcome,
}

/// What a training run produced.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub best_model: String,
    pub best_score: f64,
    pub candidates: Vec<CandidateSummary>,
    pub artifact_dir: PathBuf,
    pub report_file: Option<PathBuf>,
}

pub fn run_training(config: &TrainConfig) -> Result<TrainingSummary> {
    let artifact_dir = PathBuf::from(&config.artifact_dir);
    log::info!("Training pipeline started");

    // 1. Data ingestion
    log::trace!("Reading labeled data from {}", config.data_file);
    let raw = read_labeled_csv(&config.data_file, &config.target_column)
        .with_context(|| format!("Failed to load training data: {}", config.data_file))?;
    raw.log_input_data_summary();

    write_labeled_csv(artifact_dir.join(RAW_FILE), &raw, &config.target_column)?;
    let (train, test) = stratified_split(&raw, config.test_size, config.seed)?;
    write_labeled_csv(artifact_dir.join(TRAIN_FILE), &train, &config.target_column)?;
    write_labeled_csv(artifact_dir.join(TEST_FILE), &test, &config.target_column)?;
    log::info!(
        "Data ingestion completed: {} train rows, {} test rows",
        train.len(),
        test.len()
    );

    // 2. Scaling and preprocessing
    let mut preprocessor = FeaturePreprocessor::new();
    let x_train = preprocessor
        .fit_transform(&train.features)
        .context("Failed to fit the feature preprocessor")?;
    let x_test = preprocessor.transform(&test.features)?;
    save_object(artifact_dir.join(PREPROCESSOR_FILE), &preprocessor)?;
    log::info!("Data transformation completed");

    // 3. Model evaluation and selection
    let selector = ModelSelector::new(
        StratifiedKFold::new(config.cv_folds).with_random_state(config.seed),
    );
    let candidates = config.candidates.iter().map(|c| c.to_candidate()).collect();
    let report = selector.evaluate(
        x_train.values().view(),
        train.labels.view(),
        x_test.values().view(),
        test.labels.view(),
        candidates,
    )?;

    let summaries: Vec<CandidateSummary> = report
        .results()
        .iter()
        .map(|r| CandidateSummary {
            name: r.name.clone(),
            score: r.outcome.score(),
            outcome: r.outcome.clone(),
        })
        .collect();

    let best = report.into_best()?;
    if let Some(min_score) = config.min_score {
        if best.score < min_score {
            anyhow::bail!(
                "Best model '{}' scored ROC AUC {:.4}, below the required {:.4}",
                best.name,
                best.score,
                min_score
            );
        }
    }

    let report_file = if config.write_report {
        let path = artifact_dir.join(REPORT_FILE);
        write_training_report(config, &summaries, &best, &test.labels.to_vec(), &path)?;
        log::info!("Report written to: {}", path.display());
        Some(path)
    } else {
        None
    };

    let best_model = best.name.clone();
    let best_score = best.score;
    let persisted = PersistedModel::from_best(best, x_train.columns().to_vec())?;
    persisted.save(&artifact_dir)?;
    log::info!("Artifacts saved to: {}", artifact_dir.display());

    log::info!(
        "Training completed | Best Model: {} | ROC AUC: {}",
        best_model,
        best_score
    );

    Ok(TrainingSummary {
        best_model,
        best_score,
        candidates: summaries,
        artifact_dir,
        report_file,
    })
}

fn write_training_report(
    config: &TrainConfig,
    candidates: &[CandidateSummary],
    best: &BestCandidate,
    test_labels: &[u8],
    path: &Path,
) -> Result<()> {
    let mut report = Report::new(
        "FraudShield",
        &config.version,
        None,
        "FraudShield Training Report",
    );

    /* Section 1: Overview */
    {
        let mut overview_section = ReportSection::new("Overview");

        overview_section.add_content(html! {
            p {
                "Best model: " strong { (best.name) } " with held-out ROC AUC "
                (format!("{:.4}", best.score)) "."
            }
            table {
                tr { th { "Candidate" } th { "ROC AUC" } th { "Parameters / failure" } }
                @for c in candidates {
                    tr {
                        td { (c.name) }
                        td { (format!("{:.4}", c.score)) }
                        td {
                            @match &c.outcome {
                                CandidateOutcome::Scored { best_params, .. } => { (format!("{:?}", best_params)) }
                                CandidateOutcome::Failed { reason } => { (reason) }
                            }
                        }
                    }
                }
            }
        });

        let scores: Vec<(&str, f64)> = candidates.iter().map(|c| (c.name.as_str(), c.score)).collect();
        overview_section.add_plot(plot_candidate_scores(&scores, "Held-out ROC AUC by Candidate"));

        let scores = best.test_scores.to_vec();
        let curve = roc_curve(test_labels, &scores)?;
        overview_section.add_plot(plot_roc_curve(
            &curve,
            best.score,
            &format!("ROC Curve: {}", best.name),
        ));
        overview_section.add_plot(plot_score_histogram(
            &scores,
            test_labels,
            "Held-out Score Distribution",
        )?);

        report.add_section(overview_section);
    }

    /* Section 2: Configuration */
    {
        let mut config_section = ReportSection::new("Configuration");
        config_section.add_content(html! {
            style {
                ".code-container {
                    background-color: #f5f5f5;
                    padding: 10px;
                    border-radius: 5px;
                    overflow-x: auto;
                    font-family: monospace;
                    white-space: pre-wrap;
                }"
            }
            div class="code-container" {
                pre {
                    code { (serde_json::to_string_pretty(&config)?) }
                }
            }
        });
        report.add_section(config_section);
    }

    report
        .save_to_file(path)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use fraudshield_classifiers::inference::ErrorResponse;
use fraudshield_cli::predict::inference::run_prediction;
use fraudshield_cli::train::input::TrainConfig;
use fraudshield_cli::train::trainer;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("FRAUDSHIELD_LOG", "error,fraudshield=info"))
        .init();

    let matches = Command::new("fraudshield")
        .version(clap::crate_version!())
        .about("FraudShield CLI - Train and serve card-transaction fraud classifiers")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Ingest labeled transactions, select the best model and persist artifacts")
                .arg(
                    Arg::new("config")
                        .help("Path to training configuration file. Defaults are used when omitted.")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("data_file")
                        .short('d')
                        .long("data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to the labeled CSV data. Overrides the data file \
                             specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("artifact_dir")
                        .short('o')
                        .long("artifact-dir")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Directory the preprocessor, model, splits and report are written to. \
                             Overrides the directory specified in the configuration file.",
                        )
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("target_column")
                        .long("target")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Name of the binary label column.")
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("no_report")
                        .long("no-report")
                        .help("Disable HTML report generation.")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Score a single transaction with previously trained artifacts")
                .arg(
                    Arg::new("transaction")
                        .help("Path to a JSON file holding one transaction (Time, V1..V28, Amount)")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("artifact_dir")
                        .short('a')
                        .long("artifact-dir")
                        .help("Directory holding preprocessor.json and model.json")
                        .default_value("artifacts")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("predict", sub_m)) => handle_predict(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let config_path: Option<&PathBuf> = matches.get_one("config");
    match config_path {
        Some(path) => log::info!("[FraudShield::Train] Training from config: {:?}", path),
        None => {
            eprintln!("[FraudShield::Train] No config file provided; using defaults.");
            eprintln!(
                "[FraudShield::Train] Default config:\n{}",
                serde_json::to_string_pretty(&TrainConfig::default())?
            );
        }
    }

    let params = TrainConfig::from_arguments(config_path, matches)?;

    match trainer::run_training(&params) {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let transaction_path: &PathBuf = matches
        .get_one("transaction")
        .context("A transaction file is required")?;
    let artifact_dir: &PathBuf = matches
        .get_one("artifact_dir")
        .context("An artifact directory is required")?;

    match run_prediction(transaction_path, artifact_dir) {
        Ok(prediction) => {
            println!("{}", serde_json::to_string_pretty(&prediction)?);
            Ok(())
        }
        Err(e) => {
            log::error!("Prediction failed: {}", e);
            println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&e))?);
            std::process::exit(1)
        }
    }
}

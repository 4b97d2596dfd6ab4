use std::fs;
use std::path::Path;

use fraudshield_classifiers::error::{FraudError, Result};
use fraudshield_classifiers::inference::{InferenceContext, Prediction, Transaction};

/// Read one transaction from a JSON file.
pub fn load_transaction<P: AsRef<Path>>(path: P) -> Result<Transaction> {
    let json = fs::read_to_string(&path).map_err(|e| {
        FraudError::InvalidInput(format!(
            "Failed to read transaction {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;
    Transaction::from_json(&json)
}

/// Load the artifacts once and score a single transaction file.
pub fn run_prediction<P: AsRef<Path>, Q: AsRef<Path>>(
    transaction_path: P,
    artifact_dir: Q,
) -> Result<Prediction> {
    let context = InferenceContext::load(artifact_dir)?;
    let transaction = load_transaction(transaction_path)?;
    context.predict(&transaction)
}

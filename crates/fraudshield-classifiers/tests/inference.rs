use fraudshield_classifiers::config::{ModelConfig, ModelType};
use fraudshield_classifiers::data_handling::FeatureFrame;
use fraudshield_classifiers::inference::{
    ErrorResponse, InferenceContext, PersistedModel, Transaction, TRANSACTION_COLUMNS,
};
use fraudshield_classifiers::io::{save_object, MODEL_FILE, PREPROCESSOR_FILE};
use fraudshield_classifiers::model_selection::{CandidateModel, ModelSelector};
use fraudshield_classifiers::preprocessing::FeaturePreprocessor;
use fraudshield_classifiers::FraudError;
use ndarray::Array1;

/// Fraud rows have large amounts and positive components.
fn training_frame() -> (FeatureFrame, Array1<u8>) {
    let columns: Vec<String> = TRANSACTION_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for i in 0..40 {
        let fraud = i % 4 == 0;
        let mut row = vec![0.0; 30];
        row[0] = i as f64 * 10.0;
        for (j, v) in row.iter_mut().enumerate().take(29).skip(1) {
            let noise = ((i * 3 + j) % 5) as f64 * 0.1;
            *v = if fraud { 1.0 + noise } else { -1.0 + noise };
        }
        row[29] = if fraud { 900.0 + i as f64 } else { 10.0 + i as f64 };
        rows.push(row);
        labels.push(u8::from(fraud));
    }
    (
        FeatureFrame::from_rows(columns, rows).unwrap(),
        Array1::from_vec(labels),
    )
}

fn transaction(component: f64, amount: f64) -> Transaction {
    let mut body = serde_json::Map::new();
    for name in TRANSACTION_COLUMNS {
        body.insert(name.to_string(), serde_json::json!(component));
    }
    body.insert("Time".to_string(), serde_json::json!(50.0));
    body.insert("Amount".to_string(), serde_json::json!(amount));
    Transaction::from_json(&serde_json::Value::Object(body).to_string()).unwrap()
}

fn train_into(dir: &std::path::Path, config: ModelConfig) {
    let (frame, labels) = training_frame();
    let mut pre = FeaturePreprocessor::new();
    let x = pre.fit_transform(&frame).unwrap();

    let report = ModelSelector::default()
        .evaluate(
            x.values().view(),
            labels.view(),
            x.values().view(),
            labels.view(),
            vec![CandidateModel::from_config("model", config)],
        )
        .unwrap();
    let best = report.into_best().unwrap();
    let persisted = PersistedModel::from_best(best, x.columns().to_vec()).unwrap();

    save_object(dir.join(PREPROCESSOR_FILE), &pre).unwrap();
    persisted.save(dir).unwrap();
}

#[test]
fn loaded_context_scores_transactions() {
    let dir = tempfile::tempdir().unwrap();
    train_into(dir.path(), ModelConfig::new(0.5, "logistic".parse().unwrap()));

    let ctx = InferenceContext::load(dir.path()).unwrap();
    assert_eq!(ctx.model().candidate, "model");

    let fraud = ctx.predict(&transaction(1.2, 950.0)).unwrap();
    assert_eq!(fraud.fraud_prediction, 1);
    assert_eq!(fraud.fraud_label, "Fraud");
    assert!(fraud.fraud_probability.unwrap() > 0.5);

    let legit = ctx.predict(&transaction(-0.8, 20.0)).unwrap();
    assert_eq!(legit.fraud_prediction, 0);
    assert_eq!(legit.fraud_label, "Legitimate");
    assert!(legit.fraud_probability.unwrap() < 0.5);
}

#[test]
fn margin_models_report_no_probability() {
    let dir = tempfile::tempdir().unwrap();
    train_into(dir.path(), ModelConfig::new(0.1, "linear_svm".parse().unwrap()));

    let ctx = InferenceContext::load(dir.path()).unwrap();
    let prediction = ctx.predict(&transaction(1.2, 950.0)).unwrap();
    assert_eq!(prediction.fraud_probability, None);

    let json = serde_json::to_value(&prediction).unwrap();
    assert!(json["fraud_probability"].is_null());
}

#[test]
fn context_is_shared_read_only() {
    let dir = tempfile::tempdir().unwrap();
    train_into(dir.path(), ModelConfig::new(0.1, ModelType::Prior {}));
    let ctx = InferenceContext::load(dir.path()).unwrap();

    let tx = transaction(0.0, 10.0);
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4).map(|_| s.spawn(|| ctx.predict(&tx).unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(results[0].fraud_probability, Some(0.25));
}

#[test]
fn invalid_transaction_maps_to_structured_error() {
    let dir = tempfile::tempdir().unwrap();
    train_into(dir.path(), ModelConfig::new(0.1, ModelType::Prior {}));
    let ctx = InferenceContext::load(dir.path()).unwrap();

    let err = ctx.predict(&transaction(0.0, -5.0)).unwrap_err();
    let response = ErrorResponse::from(&err);
    assert_eq!(response.error, "invalid_input");
    assert!(response.detail.contains("Amount"));
}

#[test]
fn missing_artifacts_are_a_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        InferenceContext::load(dir.path()),
        Err(FraudError::Persistence { .. })
    ));
}

#[test]
fn corrupt_model_is_a_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    train_into(dir.path(), ModelConfig::new(0.1, ModelType::Prior {}));
    std::fs::write(dir.path().join(MODEL_FILE), "{ not json").unwrap();
    let err = InferenceContext::load(dir.path()).unwrap_err();
    assert_eq!(err.kind(), "persistence_error");
}

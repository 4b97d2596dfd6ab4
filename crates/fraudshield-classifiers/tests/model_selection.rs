use fraudshield_classifiers::config::{ModelConfig, ModelType, ParamGrid, ParamSet};
use fraudshield_classifiers::data_handling::{stratified_split, Dataset, FeatureFrame};
use fraudshield_classifiers::error::ClassifierError;
use fraudshield_classifiers::model_selection::{
    CandidateModel, CandidateOutcome, ModelSelector, FAILED_SCORE,
};
use fraudshield_classifiers::models::{Classifier, ScoreKind, Scoreable};
use fraudshield_classifiers::preprocessing::FeaturePreprocessor;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Estimator that fails in a configurable way.
struct Faulty {
    panic: bool,
}

impl Scoreable for Faulty {
    fn score(&self, _features: ArrayView1<'_, f64>) -> Result<f64, ClassifierError> {
        Err(ClassifierError::NotFitted)
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Probability
    }
}

impl Classifier for Faulty {
    fn name(&self) -> &str {
        "faulty"
    }

    fn fit(&mut self, _x: ArrayView2<'_, f64>, _y: ArrayView1<'_, u8>) -> Result<(), ClassifierError> {
        if self.panic {
            panic!("estimator blew up");
        }
        Err(ClassifierError::Training("cannot converge".to_string()))
    }

    fn with_params(&self, _params: &ParamSet) -> Result<Box<dyn Classifier>, ClassifierError> {
        Ok(Box::new(Faulty { panic: self.panic }))
    }
}

/// Two noisy clusters, fraud shifted along the first two features.
fn dataset(n: usize) -> (Array2<f64>, Array1<u8>) {
    let y: Array1<u8> = (0..n).map(|i| u8::from(i % 4 == 0)).collect();
    let x = Array2::from_shape_fn((n, 3), |(i, j)| {
        let noise = ((i * 7 + j * 13) % 11) as f64 / 11.0 - 0.5;
        let shift = if y[i] == 1 { 1.0 } else { 0.0 };
        match j {
            0 => shift + noise,
            1 => shift * 0.5 + noise,
            _ => noise,
        }
    });
    (x, y)
}

fn logistic() -> ModelConfig {
    ModelConfig::new(0.5, "logistic_regression".parse().unwrap())
}

fn gbdt() -> ModelConfig {
    ModelConfig::new(
        0.1,
        ModelType::GBDT {
            max_depth: 3,
            num_boost_round: 10,
            debug: false,
            training_optimization_level: 2,
            loss_type: "LogLikelyhood".to_string(),
        },
    )
}

#[test]
fn failing_candidate_is_isolated() {
    init_logger();
    let (x, y) = dataset(80);
    let candidates = vec![
        CandidateModel::from_config("logistic", logistic()),
        CandidateModel::new("faulty", Box::new(Faulty { panic: false })),
        CandidateModel::from_config("gbdt", gbdt()),
    ];
    let report = ModelSelector::default()
        .evaluate(x.view(), y.view(), x.view(), y.view(), candidates)
        .unwrap();

    let names: Vec<&str> = report.scores().iter().map(|(n, _)| *n).collect();
    assert_eq!(names, vec!["logistic", "faulty", "gbdt"]);
    assert_eq!(report.score("faulty"), Some(FAILED_SCORE));
    assert!(report.get("faulty").unwrap().outcome.is_failed());

    let trained: Vec<(&str, bool)> = report
        .trained_models()
        .into_iter()
        .map(|(n, m)| (n, m.is_some()))
        .collect();
    assert_eq!(trained, vec![("logistic", true), ("faulty", false), ("gbdt", true)]);

    let best = report.best().unwrap();
    assert_ne!(best.name, "faulty");
    assert!(best.outcome.score() >= 0.0);
}

#[test]
fn panicking_candidate_is_recorded_as_failure() {
    init_logger();
    let (x, y) = dataset(40);
    let candidates = vec![
        CandidateModel::new("panics", Box::new(Faulty { panic: true })),
        CandidateModel::from_config("logistic", logistic()),
    ];
    let report = ModelSelector::default()
        .evaluate(x.view(), y.view(), x.view(), y.view(), candidates)
        .unwrap();
    match &report.get("panics").unwrap().outcome {
        CandidateOutcome::Failed { reason } => assert!(reason.contains("estimator blew up")),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(report.best().unwrap().name, "logistic");
}

#[test]
fn repeated_runs_are_identical() {
    let (x, y) = dataset(120);
    let run = || {
        let candidates = vec![
            CandidateModel::from_config("logistic", logistic())
                .with_param_grid(ParamGrid::new().with("c", vec![0.01, 1.0, 100.0])),
            CandidateModel::from_config("gbdt", gbdt())
                .with_param_grid(ParamGrid::new().with("max_depth", vec![2.0, 4.0])),
        ];
        let report = ModelSelector::default()
            .evaluate(x.view(), y.view(), x.view(), y.view(), candidates)
            .unwrap();
        let scores: Vec<(String, f64)> = report
            .scores()
            .into_iter()
            .map(|(n, s)| (n.to_string(), s))
            .collect();
        let outcomes: Vec<CandidateOutcome> =
            report.results().iter().map(|r| r.outcome.clone()).collect();
        (report.best().map(|b| b.name.clone()), scores, outcomes)
    };
    assert_eq!(run(), run());
}

#[test]
fn degenerate_scenario_completes_with_prior() {
    // Two distinct rows repeated; the prior candidate scores every row alike.
    let mut columns = vec!["Time".to_string()];
    columns.extend((1..=28).map(|i| format!("V{}", i)));
    columns.push("Amount".to_string());

    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for _ in 0..10 {
        let mut legit = vec![0.0; 30];
        legit[29] = 5.0;
        rows.push(legit);
        labels.push(0u8);

        let mut fraud = vec![1.0; 30];
        fraud[29] = 500.0;
        rows.push(fraud);
        labels.push(1u8);
    }
    let data = Dataset::new(
        FeatureFrame::from_rows(columns, rows).unwrap(),
        Array1::from_vec(labels),
    )
    .unwrap();
    let (train, test) = stratified_split(&data, 0.3, 42).unwrap();

    let mut pre = FeaturePreprocessor::new();
    let x_train = pre.fit_transform(&train.features).unwrap();
    let x_test = pre.transform(&test.features).unwrap();

    let report = ModelSelector::default()
        .evaluate(
            x_train.values().view(),
            train.labels.view(),
            x_test.values().view(),
            test.labels.view(),
            vec![CandidateModel::from_config(
                "majority",
                ModelConfig::new(0.1, ModelType::Prior {}),
            )],
        )
        .unwrap();
    assert_eq!(report.score("majority"), Some(0.5));
    let best = report.into_best().unwrap();
    assert_eq!(best.name, "majority");
    assert_eq!(best.test_scores.len(), test.len());
}

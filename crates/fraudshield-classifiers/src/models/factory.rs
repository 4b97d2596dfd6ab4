use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::Classifier;
use crate::models::gbdt::GBDTClassifier;
use crate::models::linear_svm::LinearSvmClassifier;
use crate::models::logistic::LogisticRegressionClassifier;
use crate::models::prior::PriorClassifier;

/// Build a boxed, unfitted classifier from a `ModelConfig`.
pub fn build_model(params: ModelConfig) -> Box<dyn Classifier> {
    match params.model_type {
        ModelType::LogisticRegression { .. } => Box::new(LogisticRegressionClassifier::new(params)),
        ModelType::LinearSVM { .. } => Box::new(LinearSvmClassifier::new(params)),
        ModelType::GBDT { .. } => Box::new(GBDTClassifier::new(params)),
        ModelType::Prior {} => Box::new(PriorClassifier::new(params)),
    }
}

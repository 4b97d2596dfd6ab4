use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::config::{ModelConfig, ParamSet};
use crate::error::ClassifierError;
use crate::models::artifact::ModelArtifact;
use crate::models::classifier_trait::{check_width, Classifier, ScoreKind, Scoreable};

/// Baseline that ignores the features and predicts the training fraud rate.
pub struct PriorClassifier {
    params: ModelConfig,
    rate: Option<f64>,
}

impl PriorClassifier {
    pub fn new(params: ModelConfig) -> Self {
        PriorClassifier { params, rate: None }
    }
}

impl Scoreable for PriorClassifier {
    fn score(&self, _features: ArrayView1<'_, f64>) -> Result<f64, ClassifierError> {
        self.rate.ok_or(ClassifierError::NotFitted)
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Probability
    }

    fn score_batch(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ClassifierError> {
        let rate = self.rate.ok_or(ClassifierError::NotFitted)?;
        Ok(Array1::from_elem(x.nrows(), rate))
    }
}

impl Classifier for PriorClassifier {
    fn name(&self) -> &str {
        "prior"
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, u8>) -> Result<(), ClassifierError> {
        check_width(x.nrows(), y.len())?;
        if y.is_empty() {
            return Err(ClassifierError::Training("no training rows".to_string()));
        }
        let positives = y.iter().filter(|&&l| l == 1).count();
        self.rate = Some(positives as f64 / y.len() as f64);
        Ok(())
    }

    fn with_params(&self, params: &ParamSet) -> Result<Box<dyn Classifier>, ClassifierError> {
        Ok(Box::new(Self::new(self.params.with_params(params)?)))
    }

    fn into_artifact(self: Box<Self>) -> Result<ModelArtifact, ClassifierError> {
        self.rate
            .map(|rate| ModelArtifact::Prior { rate })
            .ok_or(ClassifierError::NotFitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelType;
    use ndarray::array;

    #[test]
    fn predicts_the_training_rate() {
        let mut model = PriorClassifier::new(ModelConfig::new(0.1, ModelType::Prior {}));
        model
            .fit(array![[1.0], [2.0], [3.0], [4.0]].view(), array![0u8, 0, 0, 1].view())
            .unwrap();
        assert_eq!(model.score(array![100.0].view()).unwrap(), 0.25);
        assert_eq!(model.predict(array![[0.0], [1.0]].view()).unwrap(), array![0u8, 0]);
    }
}

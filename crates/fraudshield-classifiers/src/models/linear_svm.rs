use ndarray::{Array1, ArrayView1, ArrayView2, Zip};

use crate::config::{ModelConfig, ModelType, ParamSet};
use crate::error::ClassifierError;
use crate::models::artifact::{LinearWeights, ModelArtifact};
use crate::models::classifier_trait::{
    check_training_data, class_weights, sigmoid, Classifier, ScoreKind, Scoreable,
};

/// Linear support vector machine trained with hinge-loss sub-gradient descent.
///
/// Has no probability output. Scores are the decision margin passed through
/// the logistic function, which keeps the ranking and maps into `[0, 1]`.
pub struct LinearSvmClassifier {
    params: ModelConfig,
    fitted: Option<LinearWeights>,
}

impl LinearSvmClassifier {
    pub fn new(params: ModelConfig) -> Self {
        LinearSvmClassifier {
            params,
            fitted: None,
        }
    }

    fn fitted(&self) -> Result<&LinearWeights, ClassifierError> {
        self.fitted.as_ref().ok_or(ClassifierError::NotFitted)
    }

    /// Raw signed distance to the separating hyperplane.
    pub fn decision_function(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ClassifierError> {
        self.fitted()?.decision_batch(x)
    }
}

impl Scoreable for LinearSvmClassifier {
    fn score(&self, features: ArrayView1<'_, f64>) -> Result<f64, ClassifierError> {
        Ok(sigmoid(self.fitted()?.decision(features)?))
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Margin
    }

    fn score_batch(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ClassifierError> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }
}

impl Classifier for LinearSvmClassifier {
    fn name(&self) -> &str {
        "linear_svm"
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, u8>) -> Result<(), ClassifierError> {
        self.params.validate()?;
        check_training_data(x, y)?;

        let (c, max_iter, balanced) = match self.params.model_type {
            ModelType::LinearSVM {
                c,
                max_iter,
                balanced,
            } => (c, max_iter, balanced),
            ref other => {
                return Err(ClassifierError::InvalidParameter {
                    name: "model_type".to_string(),
                    reason: format!("expected linear_svm, got {}", other.name()),
                })
            }
        };

        let n = x.nrows() as f64;
        let (w_neg, w_pos) = class_weights(y, balanced);
        let sign: Array1<f64> = y.mapv(|l| if l == 1 { 1.0 } else { -1.0 });
        let sample_weight: Array1<f64> = y.mapv(|l| if l == 1 { w_pos } else { w_neg });
        let lr0 = f64::from(self.params.learning_rate);

        let mut model = LinearWeights::zeros(x.ncols());
        for iter in 0..max_iter {
            let margin = model.decision_batch(x)?;
            // Only rows inside the margin contribute to the hinge sub-gradient.
            let coef = Zip::from(&margin)
                .and(&sign)
                .and(&sample_weight)
                .map_collect(|&m, &s, &w| if s * m < 1.0 { -s * w / n } else { 0.0 });

            let grad_w = x.t().dot(&coef) * c + &model.weights;
            let grad_b = coef.sum() * c;

            let lr = lr0 / (1.0 + iter as f64).sqrt();
            model.weights.scaled_add(-lr, &grad_w);
            model.bias -= lr * grad_b;
        }
        if !model.bias.is_finite() || model.weights.iter().any(|w| !w.is_finite()) {
            return Err(ClassifierError::Training(
                "sub-gradient descent diverged; lower the learning rate".to_string(),
            ));
        }

        self.fitted = Some(model);
        Ok(())
    }

    fn with_params(&self, params: &ParamSet) -> Result<Box<dyn Classifier>, ClassifierError> {
        Ok(Box::new(Self::new(self.params.with_params(params)?)))
    }

    fn into_artifact(self: Box<Self>) -> Result<ModelArtifact, ClassifierError> {
        self.fitted
            .map(ModelArtifact::LinearSvm)
            .ok_or(ClassifierError::NotFitted)
    }
}

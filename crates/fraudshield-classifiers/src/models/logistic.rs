use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::config::{ModelConfig, ModelType, ParamSet};
use crate::error::ClassifierError;
use crate::models::artifact::{LinearWeights, ModelArtifact};
use crate::models::classifier_trait::{
    check_training_data, class_weights, sigmoid, Classifier, ScoreKind, Scoreable,
};

/// L2-regularized logistic regression fitted by batch gradient descent.
pub struct LogisticRegressionClassifier {
    params: ModelConfig,
    fitted: Option<LinearWeights>,
}

impl LogisticRegressionClassifier {
    pub fn new(params: ModelConfig) -> Self {
        LogisticRegressionClassifier {
            params,
            fitted: None,
        }
    }

    fn fitted(&self) -> Result<&LinearWeights, ClassifierError> {
        self.fitted.as_ref().ok_or(ClassifierError::NotFitted)
    }
}

impl Scoreable for LogisticRegressionClassifier {
    fn score(&self, features: ArrayView1<'_, f64>) -> Result<f64, ClassifierError> {
        Ok(sigmoid(self.fitted()?.decision(features)?))
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Probability
    }

    fn score_batch(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ClassifierError> {
        Ok(self.fitted()?.decision_batch(x)?.mapv(sigmoid))
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn name(&self) -> &str {
        "logistic_regression"
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, u8>) -> Result<(), ClassifierError> {
        self.params.validate()?;
        check_training_data(x, y)?;

        let (c, max_iter, tol, balanced) = match self.params.model_type {
            ModelType::LogisticRegression {
                c,
                max_iter,
                tol,
                balanced,
            } => (c, max_iter, tol, balanced),
            ref other => {
                return Err(ClassifierError::InvalidParameter {
                    name: "model_type".to_string(),
                    reason: format!("expected logistic_regression, got {}", other.name()),
                })
            }
        };

        let n = x.nrows() as f64;
        let (w_neg, w_pos) = class_weights(y, balanced);
        let sample_weight: Array1<f64> = y.mapv(|l| if l == 1 { w_pos } else { w_neg });
        let target: Array1<f64> = y.mapv(f64::from);
        let total_weight = sample_weight.sum();
        let lr = f64::from(self.params.learning_rate);

        let mut model = LinearWeights::zeros(x.ncols());
        let mut converged = false;
        for iter in 0..max_iter {
            let p = model.decision_batch(x)?.mapv(sigmoid);
            let residual = (&p - &target) * &sample_weight / total_weight;
            let grad_w = x.t().dot(&residual) + &model.weights / (c * n);
            let grad_b = residual.sum();

            model.weights.scaled_add(-lr, &grad_w);
            model.bias -= lr * grad_b;

            let max_grad = grad_w.iter().fold(grad_b.abs(), |m, g| m.max(g.abs()));
            if max_grad < tol {
                log::trace!("logistic regression converged after {} iterations", iter + 1);
                converged = true;
                break;
            }
        }
        if !converged {
            log::debug!(
                "logistic regression stopped at max_iter = {} before reaching tol = {}",
                max_iter,
                tol
            );
        }
        if !model.bias.is_finite() || model.weights.iter().any(|w| !w.is_finite()) {
            return Err(ClassifierError::Training(
                "gradient descent diverged; lower the learning rate".to_string(),
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
            .map(ModelArtifact::LogisticRegression)
            .ok_or(ClassifierError::NotFitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::roc_auc;
    use ndarray::{array, Array2};

    fn separable() -> (Array2<f64>, Array1<u8>) {
        let x = array![
            [-2.0, 0.1],
            [-1.5, -0.3],
            [-1.0, 0.2],
            [-0.5, 0.0],
            [0.5, 0.1],
            [1.0, -0.2],
            [1.5, 0.3],
            [2.0, 0.0]
        ];
        let y = array![0u8, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn learns_a_separable_problem() {
        let (x, y) = separable();
        let mut model = LogisticRegressionClassifier::new(ModelConfig::new(
            0.5,
            "logistic".parse().unwrap(),
        ));
        model.fit(x.view(), y.view()).unwrap();
        let scores = model.score_batch(x.view()).unwrap();
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        assert_eq!(roc_auc(y.as_slice().unwrap(), scores.as_slice().unwrap()).unwrap(), 1.0);
        assert_eq!(model.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn scoring_before_fit_fails() {
        let model = LogisticRegressionClassifier::new(ModelConfig::new(
            0.5,
            "logistic".parse().unwrap(),
        ));
        assert_eq!(
            model.score(array![0.0, 0.0].view()),
            Err(ClassifierError::NotFitted)
        );
    }

    #[test]
    fn artifact_scores_like_the_model() {
        let (x, y) = separable();
        let mut model = Box::new(LogisticRegressionClassifier::new(ModelConfig::new(
            0.5,
            "logistic".parse().unwrap(),
        )));
        model.fit(x.view(), y.view()).unwrap();
        let expected = model.score_batch(x.view()).unwrap();
        let artifact = model.into_artifact().unwrap();
        assert_eq!(artifact.score_batch(x.view()).unwrap(), expected);
    }
}

use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use crate::config::{ModelConfig, ModelType, ParamSet};
use crate::error::ClassifierError;
use crate::models::artifact::{GbdtModel, ModelArtifact};
use crate::models::classifier_trait::{check_training_data, Classifier, ScoreKind, Scoreable};

/// Gradient Boosting Decision Tree (GBDT) classifier
pub struct GBDTClassifier {
    model: Option<GbdtModel>,
    params: ModelConfig,
}

impl GBDTClassifier {
    pub fn new(params: ModelConfig) -> Self {
        GBDTClassifier {
            model: None,
            params,
        }
    }

    fn fitted(&self) -> Result<&GbdtModel, ClassifierError> {
        self.model.as_ref().ok_or(ClassifierError::NotFitted)
    }
}

impl Scoreable for GBDTClassifier {
    fn score(&self, features: ArrayView1<'_, f64>) -> Result<f64, ClassifierError> {
        Ok(self.score_batch(features.insert_axis(Axis(0)))?[0])
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Probability
    }

    fn score_batch(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ClassifierError> {
        self.fitted()?.probabilities(x)
    }
}

impl Classifier for GBDTClassifier {
    fn name(&self) -> &str {
        "gbdt"
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, u8>) -> Result<(), ClassifierError> {
        self.params.validate()?;
        check_training_data(x, y)?;
        let feature_size = x.ncols();

        match &self.params.model_type {
            ModelType::GBDT {
                max_depth,
                num_boost_round,
                debug,
                training_optimization_level,
                loss_type,
            } => {
                let mut config = Config::new();

                config.set_feature_size(feature_size);
                config.set_shrinkage(self.params.learning_rate);
                config.set_max_depth(*max_depth);
                config.set_iterations(*num_boost_round as usize);
                config.set_debug(*debug);
                config.set_training_optimization_level(*training_optimization_level);
                config.set_loss(loss_type);

                let mut gbdt = GBDT::new(&config);

                // LogLikelyhood expects labels in {-1, 1}
                let mut train_x: DataVec = x
                    .rows()
                    .into_iter()
                    .zip(y.iter())
                    .map(|(row, &label)| {
                        let features = row.iter().map(|&v| v as f32).collect();
                        let target = if label == 1 { 1.0 } else { -1.0 };
                        Data::new_training_data(features, 1.0, target, None)
                    })
                    .collect();

                gbdt.fit(&mut train_x);
                log::trace!("gbdt fitted {} rounds on {} rows", num_boost_round, x.nrows());

                self.model = Some(GbdtModel {
                    n_features: feature_size,
                    trees: gbdt,
                });
                Ok(())
            }
            other => Err(ClassifierError::InvalidParameter {
                name: "model_type".to_string(),
                reason: format!("expected gbdt, got {}", other.name()),
            }),
        }
    }

    fn with_params(&self, params: &ParamSet) -> Result<Box<dyn Classifier>, ClassifierError> {
        Ok(Box::new(Self::new(self.params.with_params(params)?)))
    }

    fn into_artifact(self: Box<Self>) -> Result<ModelArtifact, ClassifierError> {
        self.model
            .map(ModelArtifact::Gbdt)
            .ok_or(ClassifierError::NotFitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn params(num_boost_round: u32) -> ModelConfig {
        ModelConfig {
            learning_rate: 0.1,
            model_type: ModelType::GBDT {
                max_depth: 3,
                num_boost_round,
                debug: false,
                training_optimization_level: 2,
                loss_type: "LogLikelyhood".to_string(),
            },
        }
    }

    #[test]
    fn test_gbdt_classifier() {
        // The label is fully determined by the sign of the second feature
        let x = Array2::from_shape_fn((20, 3), |(i, j)| match j {
            0 => i as f64 * 0.1,
            1 => if i % 2 == 0 { 1.0 } else { -1.0 },
            _ => 5.0,
        });
        let y: Array1<u8> = (0..20).map(|i| u8::from(i % 2 == 0)).collect();

        let mut classifier = GBDTClassifier::new(params(20));
        classifier.fit(x.view(), y.view()).unwrap();

        let scores = classifier.score_batch(x.view()).unwrap();
        assert_eq!(scores.len(), y.len());
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        for (score, label) in scores.iter().zip(y.iter()) {
            if *label == 1 {
                assert!(*score > 0.5);
            } else {
                assert!(*score < 0.5);
            }
        }
    }

    #[test]
    fn zero_rounds_are_rejected_before_training() {
        let x = Array2::<f64>::zeros((4, 2));
        let y = ndarray::array![0u8, 1, 0, 1];
        let mut classifier = GBDTClassifier::new(params(0));
        assert!(matches!(
            classifier.fit(x.view(), y.view()),
            Err(ClassifierError::InvalidParameter { .. })
        ));
    }
}

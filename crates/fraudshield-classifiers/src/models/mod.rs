pub mod artifact;
pub mod gbdt;
pub mod linear_svm;
pub mod logistic;
pub mod prior;

pub mod classifier_trait;
pub mod factory;

pub use artifact::ModelArtifact;
pub use classifier_trait::{Classifier, ScoreKind, Scoreable};
pub use factory::build_model;

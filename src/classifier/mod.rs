//! Gesture classifiers and the startup selection policy.
//!
//! Two backends share one contract: a trained model fed with the flattened
//! feature vector, or the geometric rule engine fed with the landmarks
//! directly. One is picked at startup and shared read-only for the process
//! lifetime.

mod forest;
mod model;
mod rules;


use std::sync::Arc;

use crate::config::ClassifierConfig;
use crate::error::{FrameError, ModelLoadError};
use crate::types::{ClassificationResult, LandmarkSet};

pub use forest::ForestModel;
pub use model::{rank_scores, to_probabilities, ModelClassifier, ModelKind, Prediction};
pub use rules::{
    decide, HandPredicates, RuleBasedClassifier, EXTENDED_THRESHOLD, FINGERS_CLOSE_THRESHOLD,
    RULES, RULE_CONFIDENCE, THUMB_NEAR_THRESHOLD,
};

pub trait GestureClassifier: Send + Sync {
    fn name(&self) -> String;

    /// Callers only pass a detected hand; the rule engine also tolerates an empty set.
    fn classify(&self, landmarks: &LandmarkSet) -> Result<ClassificationResult, FrameError>;
}

pub fn load_model_classifier(config: &ClassifierConfig) -> Result<ModelClassifier, ModelLoadError> {
    let kind: ModelKind = config.kind.parse()?;
    ModelClassifier::load(kind, &config.model_path)
}

/// Picks the trained model when it loads, the rule engine otherwise. Never fails.
pub fn select_classifier(config: &ClassifierConfig) -> Arc<dyn GestureClassifier> {
    match load_model_classifier(config) {
        Ok(model) => {
            tracing::info!(
                kind = %model.kind(),
                path = %model.path().display(),
                "Loaded gesture model"
            );
            Arc::new(model)
        }
        Err(e @ ModelLoadError::Missing(_)) => {
            tracing::warn!("{e}. Using rule-based classification.");
            Arc::new(RuleBasedClassifier::new())
        }
        Err(e) => {
            tracing::error!("Failed to load model: {e}. Using rule-based classification.");
            Arc::new(RuleBasedClassifier::new())
        }
    }
}

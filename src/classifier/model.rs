use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use super::forest::ForestModel;
use super::GestureClassifier;
use crate::error::{FrameError, ModelLoadError};
use crate::features::{FeatureVector, FEATURE_LEN};
use crate::types::{ClassificationResult, GestureLabel, LandmarkSet, MODEL_LABELS};

/// Serialized model formats the service can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Feed-forward network exported to ONNX.
    Onnx,
    /// smartcore random forest serialized with bincode.
    Forest,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Onnx => "onnx",
            ModelKind::Forest => "forest",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ModelLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(ModelKind::Onnx),
            "forest" => Ok(ModelKind::Forest),
            other => Err(ModelLoadError::UnsupportedKind(other.to_string())),
        }
    }
}

/// Canonical model output, whatever order the backend reports it in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub probability: f32,
}

enum Backend {
    // ort sessions need `&mut` to run
    Onnx(Mutex<Session>),
    Forest(ForestModel),
}

impl Prediction {
    /// From the network's `(max_probability, class_index)`.
    pub fn from_network((probability, class_index): (f32, usize)) -> Self {
        Self {
            class_index,
            probability,
        }
    }

    /// From the forest's `(class_index, max_probability)`.
    pub fn from_forest((class_index, probability): (usize, f32)) -> Self {
        Self {
            class_index,
            probability,
        }
    }
}

/// Adapter that puts a trained model behind the classifier contract.
pub struct ModelClassifier {
    kind: ModelKind,
    path: PathBuf,
    backend: Backend,
}

impl ModelClassifier {
    pub fn load(kind: ModelKind, path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ModelLoadError::Missing(path));
        }

        let backend = match kind {
            ModelKind::Onnx => {
                let session = open_session(&path).map_err(|e| ModelLoadError::Deserialize {
                    kind: kind.as_str(),
                    path: path.clone(),
                    reason: format!("{e:#}"),
                })?;
                Backend::Onnx(Mutex::new(session))
            }
            ModelKind::Forest => {
                let forest = std::fs::read(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|bytes| ForestModel::from_bytes(&bytes))
                    .map_err(|reason| ModelLoadError::Deserialize {
                        kind: kind.as_str(),
                        path: path.clone(),
                        reason,
                    })?;
                forest
                    .validate(MODEL_LABELS.len())
                    .map_err(|reason| ModelLoadError::Invalid {
                        kind: kind.as_str(),
                        reason,
                    })?;
                Backend::Forest(forest)
            }
        };

        Ok(Self {
            kind,
            path,
            backend,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<ClassificationResult, FrameError> {
        let prediction = match &self.backend {
            Backend::Onnx(session) => Prediction::from_network(run_network(session, features)?),
            Backend::Forest(forest) => Prediction::from_forest(
                forest
                    .predict(features.as_slice())
                    .map_err(FrameError::Classification)?,
            ),
        };

        let label = GestureLabel::from_index(prediction.class_index).ok_or_else(|| {
            FrameError::Classification(format!(
                "model predicted unknown class {}",
                prediction.class_index
            ))
        })?;
        Ok(ClassificationResult::new(
            label,
            prediction.probability.clamp(0.0, 1.0),
        ))
    }

    /// Human-readable summary of the loaded artifact.
    pub fn describe(&self) -> String {
        match &self.backend {
            Backend::Onnx(session) => {
                let session = session.lock().unwrap_or_else(PoisonError::into_inner);
                let mut out = String::from("--- Inputs ---\n");
                for (i, input) in session.inputs.iter().enumerate() {
                    out.push_str(&format!("#{}: {} ({:?})\n", i, input.name, input.input_type));
                }
                out.push_str("--- Outputs ---\n");
                for (i, output) in session.outputs.iter().enumerate() {
                    out.push_str(&format!("#{}: {} ({:?})\n", i, output.name, output.output_type));
                }
                out
            }
            Backend::Forest(forest) => format!(
                "random forest: {} trees, classes {:?}",
                forest.tree_count(),
                forest.classes()
            ),
        }
    }
}

impl GestureClassifier for ModelClassifier {
    fn name(&self) -> String {
        format!("Model ({}: {})", self.kind, self.path.display())
    }

    fn classify(&self, landmarks: &LandmarkSet) -> Result<ClassificationResult, FrameError> {
        let features = FeatureVector::from_landmarks(landmarks).ok_or_else(|| {
            FrameError::Classification("model classifier called without a hand".to_string())
        })?;
        self.predict(&features)
    }
}

fn open_session(path: &Path) -> anyhow::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(1)?
        .with_execution_providers([
            ort::execution_providers::CPUExecutionProvider::default().build(),
        ])?
        .commit_from_file(path)?;
    Ok(session)
}

/// Runs the network; reports `(max_probability, class_index)`.
fn run_network(session: &Mutex<Session>, features: &FeatureVector) -> Result<(f32, usize), FrameError> {
    // A session is not left half-updated by a failed run
    let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
    let scores = infer_scores(&mut session, features)
        .map_err(|e| FrameError::Classification(format!("{e:#}")))?;
    rank_scores(&scores)
}

/// Picks the most probable class from raw network output.
///
/// Returns `(max_probability, class_index)`; ties go to the lowest index.
pub fn rank_scores(scores: &[f32]) -> Result<(f32, usize), FrameError> {
    if scores.len() != MODEL_LABELS.len() {
        return Err(FrameError::Classification(format!(
            "model produced {} scores, expected {}",
            scores.len(),
            MODEL_LABELS.len()
        )));
    }
    if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
        return Err(FrameError::Classification(format!("model produced a non-finite score ({bad})")));
    }

    let probs = to_probabilities(scores);
    let (class_index, probability) = probs
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best });
    Ok((probability, class_index))
}

fn infer_scores(session: &mut Session, features: &FeatureVector) -> anyhow::Result<Vec<f32>> {
    let input = Tensor::from_array((vec![1, FEATURE_LEN as i64], features.as_slice().to_vec()))?;
    let outputs = session.run(ort::inputs![input])?;
    let (_shape, data) = outputs[0].try_extract_tensor::<f32>()?;
    Ok(data.to_vec())
}

/// Passes a distribution through untouched, softmaxes anything else.
pub fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    let sum: f32 = scores.iter().sum();
    let is_distribution = scores.iter().all(|s| (0.0..=1.0).contains(s)) && (sum - 1.0).abs() < 1e-3;
    if is_distribution {
        return scores.to_vec();
    }

    let max_logit = scores.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exps: Vec<f32> = scores.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum_exps: f32 = exps.iter().sum();
    exps.iter().map(|&x| x / sum_exps).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::forest::tests::fitted_forest_bytes;
    use std::io::Write;

    fn write_model(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("onnx".parse::<ModelKind>().unwrap(), ModelKind::Onnx);
        assert_eq!(" Forest ".parse::<ModelKind>().unwrap(), ModelKind::Forest);
        assert!(matches!(
            "tensorflow".parse::<ModelKind>(),
            Err(ModelLoadError::UnsupportedKind(k)) if k == "tensorflow"
        ));
    }

    #[test]
    fn missing_artifact_is_a_load_error() {
        for kind in [ModelKind::Onnx, ModelKind::Forest] {
            let err = ModelClassifier::load(kind, "does/not/exist.bin").err().unwrap();
            assert!(matches!(err, ModelLoadError::Missing(_)), "{err}");
        }
    }

    #[test]
    fn garbage_artifact_is_a_load_error() {
        let file = write_model(b"not a model");
        let err = ModelClassifier::load(ModelKind::Forest, file.path()).err().unwrap();
        assert!(matches!(err, ModelLoadError::Deserialize { .. }), "{err}");

        let err = ModelClassifier::load(ModelKind::Onnx, file.path()).err().unwrap();
        assert!(matches!(err, ModelLoadError::Deserialize { .. }), "{err}");
    }

    #[test]
    fn forest_with_unknown_class_is_invalid() {
        let file = write_model(&fitted_forest_bytes((0, 9)));
        let err = ModelClassifier::load(ModelKind::Forest, file.path()).err().unwrap();
        assert!(matches!(err, ModelLoadError::Invalid { .. }), "{err}");
    }

    #[test]
    fn forest_prediction_maps_to_label_and_confidence() {
        let file = write_model(&fitted_forest_bytes((1, 4)));
        let classifier = ModelClassifier::load(ModelKind::Forest, file.path()).unwrap();
        assert!(classifier.describe().contains("15 trees"));

        let result = classifier.predict(&FeatureVector::from_values([0.15; FEATURE_LEN])).unwrap();
        assert_eq!(result.label, GestureLabel::Hello);
        assert!((result.confidence - 1.0).abs() < 1e-6);

        let result = classifier.predict(&FeatureVector::from_values([0.85; FEATURE_LEN])).unwrap();
        assert_eq!(result.label, GestureLabel::No);
        assert!(result.confidence > 0.5 && result.confidence <= 1.0);
    }

    #[test]
    fn model_refuses_empty_hand() {
        let file = write_model(&fitted_forest_bytes((1, 4)));
        let classifier = ModelClassifier::load(ModelKind::Forest, file.path()).unwrap();
        let err = GestureClassifier::classify(&classifier, &LandmarkSet::empty()).unwrap_err();
        assert!(matches!(err, FrameError::Classification(_)));
    }

    #[test]
    fn network_probabilities_keep_their_order() {
        let (probability, class_index) = rank_scores(&[0.1, 0.2, 0.6, 0.05, 0.05]).unwrap();
        assert_eq!(class_index, 2);
        assert!((probability - 0.6).abs() < 1e-6);

        let prediction = Prediction::from_network((probability, class_index));
        assert_eq!(prediction.class_index, 2);
        assert!((prediction.probability - 0.6).abs() < 1e-6);
    }

    #[test]
    fn network_logits_are_softmaxed_before_ranking() {
        let (probability, class_index) = rank_scores(&[1.0, 3.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(class_index, 1);
        let e = std::f32::consts::E;
        let expected = e.powi(3) / (e.powi(3) + e + 3.0);
        assert!((probability - expected).abs() < 1e-5, "{probability} vs {expected}");
    }

    #[test]
    fn network_tie_goes_to_lowest_index() {
        let (probability, class_index) = rank_scores(&[0.05, 0.4, 0.4, 0.1, 0.05]).unwrap();
        assert_eq!(class_index, 1);
        assert!((probability - 0.4).abs() < 1e-6);
    }

    #[test]
    fn network_nan_or_wrong_width_is_a_classification_error() {
        let err = rank_scores(&[f32::NAN, 0.1, 0.2, 0.3, 0.4]).unwrap_err();
        assert!(matches!(err, FrameError::Classification(ref m) if m.contains("non-finite")));
        assert!(matches!(rank_scores(&[f32::INFINITY; 5]), Err(FrameError::Classification(_))));
        assert!(matches!(rank_scores(&[0.5, 0.5]), Err(FrameError::Classification(_))));
    }

    #[test]
    fn both_backend_orders_land_on_the_same_prediction() {
        assert_eq!(Prediction::from_network((0.7, 3)), Prediction::from_forest((3, 0.7)));
    }

    #[test]
    fn probabilities_pass_through_and_logits_are_softmaxed() {
        let probs = [0.1, 0.2, 0.3, 0.4, 0.0];
        assert_eq!(to_probabilities(&probs), probs.to_vec());

        let softened = to_probabilities(&[2.0, 1.0, 0.0, -1.0, 5.0]);
        let sum: f32 = softened.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(softened[4] > softened[0]);
    }
}

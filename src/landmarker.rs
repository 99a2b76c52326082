use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbImage};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::LandmarkerConfig;
use crate::types::{Landmark, LandmarkSet, HAND_LANDMARKS};

/// External hand-pose estimator: RGB frame in, at most one hand out.
pub trait HandLandmarker: Send {
    fn name(&self) -> String;
    fn detect(&mut self, frame: &RgbImage) -> Result<LandmarkSet>;
}

/// Estimators are not reentrant; every connection goes through this lock.
///
/// A tokio mutex: sessions wait on it without holding a blocking thread, and a
/// panicking `detect` releases it on unwind instead of poisoning it.
pub type SharedLandmarker = Arc<Mutex<Box<dyn HandLandmarker>>>;

pub fn shared(landmarker: impl HandLandmarker + 'static) -> SharedLandmarker {
    Arc::new(Mutex::new(Box::new(landmarker)))
}

/// Used when no landmark model is installed: every frame has no hand.
#[derive(Debug, Default)]
pub struct NullLandmarker;

impl HandLandmarker for NullLandmarker {
    fn name(&self) -> String {
        "No landmark model (no hands reported)".to_string()
    }

    fn detect(&mut self, _frame: &RgbImage) -> Result<LandmarkSet> {
        Ok(LandmarkSet::empty())
    }
}

const INPUT_SIZE: u32 = 224;

/// Single-hand landmark network (MediaPipe hand landmark export).
///
/// Input: `[1, 224, 224, 3]` RGB in [0, 1].
/// Output 0: 21 × (x, y, z) in 224-pixel space. Output 1: hand presence.
pub struct OnnxHandLandmarker {
    session: Session,
    min_detection_confidence: f32,
}

impl OnnxHandLandmarker {
    pub fn new(model_path: &str, min_detection_confidence: f32, intra_threads: usize) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .with_execution_providers([
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])?
            .commit_from_file(model_path)
            .with_context(|| format!("loading hand landmark model {model_path}"))?;

        Ok(Self {
            session,
            min_detection_confidence,
        })
    }

    fn preprocess(frame: &RgbImage) -> Vec<f32> {
        let resized = image::imageops::resize(frame, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let mut input_data = Vec::with_capacity((INPUT_SIZE * INPUT_SIZE * 3) as usize);
        for pixel in resized.pixels() {
            input_data.push(pixel[0] as f32 / 255.0);
            input_data.push(pixel[1] as f32 / 255.0);
            input_data.push(pixel[2] as f32 / 255.0);
        }
        input_data
    }
}

/// Logistic squash for raw presence logits; probabilities pass through.
fn presence_probability(raw: f32) -> f32 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        1.0 / (1.0 + (-raw).exp())
    }
}

/// Converts raw network coordinates into normalized image coordinates.
pub fn decode_hand(raw: &[f32], presence: f32, min_confidence: f32) -> Result<LandmarkSet> {
    if presence_probability(presence) < min_confidence {
        return Ok(LandmarkSet::empty());
    }
    anyhow::ensure!(
        raw.len() >= HAND_LANDMARKS * 3,
        "landmark output has {} values, expected {}",
        raw.len(),
        HAND_LANDMARKS * 3
    );

    let scale = INPUT_SIZE as f32;
    let points = raw
        .chunks_exact(3)
        .take(HAND_LANDMARKS)
        .map(|c| Landmark::new(c[0] / scale, c[1] / scale, c[2] / scale))
        .collect();
    Ok(LandmarkSet::from_points(points)?)
}

impl HandLandmarker for OnnxHandLandmarker {
    fn name(&self) -> String {
        "Hand Landmarks (21 pts)".to_string()
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<LandmarkSet> {
        let input_data = Self::preprocess(frame);
        let shape = vec![1, INPUT_SIZE as i64, INPUT_SIZE as i64, 3];
        let input = ort::value::Tensor::from_array((shape, input_data))?;
        let outputs = self.session.run(ort::inputs![input])?;

        let (_shape, coords) = outputs[0].try_extract_tensor::<f32>()?;
        let (_shape, presence) = outputs[1].try_extract_tensor::<f32>()?;
        let presence = presence.first().copied().unwrap_or(0.0);

        decode_hand(coords, presence, self.min_detection_confidence)
    }
}

/// Loads the configured estimator, or the null one when its model is absent.
pub fn build_landmarker(config: &LandmarkerConfig) -> Result<SharedLandmarker> {
    if Path::new(&config.model_path).exists() {
        tracing::info!("Loading hand landmark model from {}...", config.model_path);
        let landmarker = OnnxHandLandmarker::new(
            &config.model_path,
            config.min_detection_confidence,
            config.intra_threads,
        )?;
        Ok(shared(landmarker))
    } else {
        tracing::warn!(
            "Hand landmark model not found at {}. No hands will be detected.",
            config.model_path
        );
        Ok(shared(NullLandmarker))
    }
}

use image::RgbImage;
use std::sync::Arc;

use crate::classifier::GestureClassifier;
use crate::error::FrameError;
use crate::landmarker::{HandLandmarker, SharedLandmarker};
use crate::protocol::{FrameMessage, GestureResponse};

/// Turns one frame message into one response. Holds no per-frame state.
#[derive(Clone)]
pub struct FramePipeline {
    landmarker: SharedLandmarker,
    classifier: Arc<dyn GestureClassifier>,
}

impl FramePipeline {
    pub fn new(landmarker: SharedLandmarker, classifier: Arc<dyn GestureClassifier>) -> Self {
        Self {
            landmarker,
            classifier,
        }
    }

    pub fn classifier_name(&self) -> String {
        self.classifier.name()
    }

    pub fn landmarker_name(&self) -> String {
        match self.landmarker.try_lock() {
            Ok(landmarker) => landmarker.name(),
            Err(_) => "busy".to_string(),
        }
    }

    pub fn landmarker(&self) -> &SharedLandmarker {
        &self.landmarker
    }

    /// Blocking; call from a plain thread, never from async code.
    pub fn process_message(&self, text: &str) -> Result<GestureResponse, FrameError> {
        let frame = decode_message(text)?;
        self.process_image(&frame)
    }

    /// Blocking; call from a plain thread, never from async code.
    pub fn process_image(&self, frame: &RgbImage) -> Result<GestureResponse, FrameError> {
        let mut landmarker = self.landmarker.blocking_lock();
        self.process_with(&mut **landmarker, frame)
    }

    /// Steps 3-6 with the estimator already locked by the caller.
    pub fn process_with(
        &self,
        landmarker: &mut dyn HandLandmarker,
        frame: &RgbImage,
    ) -> Result<GestureResponse, FrameError> {
        let landmarks = landmarker
            .detect(frame)
            .map_err(|e| FrameError::Extraction(format!("{e:#}")))?;
        tracing::debug!("Extracted {} landmarks", landmarks.len());

        if landmarks.is_empty() {
            return Ok(GestureResponse::no_hand());
        }

        let result = self.classifier.classify(&landmarks)?;
        tracing::info!(
            gesture = %result.label,
            confidence = result.confidence,
            "Predicted gesture"
        );
        Ok(GestureResponse::new(landmarks, result))
    }
}

/// Steps 1-2: unwraps the data URL and decodes the image it carries.
pub fn decode_message(text: &str) -> Result<RgbImage, FrameError> {
    let message = FrameMessage::parse(text)?;
    let bytes = message.image_bytes()?;
    decode_image(&bytes)
}

/// Decodes any supported image container into packed RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, FrameError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| FrameError::Decode(format!("undecodable image: {e}")))?;
    // The estimator expects RGB regardless of the source color type
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::RuleBasedClassifier;
    use crate::landmarker::shared;
    use crate::types::{ClassificationResult, GestureLabel, Landmark, LandmarkSet};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedHand(LandmarkSet);

    impl HandLandmarker for FixedHand {
        fn name(&self) -> String {
            "fixed".to_string()
        }

        fn detect(&mut self, _frame: &RgbImage) -> anyhow::Result<LandmarkSet> {
            Ok(self.0.clone())
        }
    }

    struct FailingHand;

    impl HandLandmarker for FailingHand {
        fn name(&self) -> String {
            "failing".to_string()
        }

        fn detect(&mut self, _frame: &RgbImage) -> anyhow::Result<LandmarkSet> {
            anyhow::bail!("tracker crashed")
        }
    }

    #[derive(Default)]
    struct CountingClassifier(AtomicUsize);

    impl GestureClassifier for CountingClassifier {
        fn name(&self) -> String {
            "counting".to_string()
        }

        fn classify(&self, _landmarks: &LandmarkSet) -> Result<ClassificationResult, FrameError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ClassificationResult::new(GestureLabel::Yes, 0.42))
        }
    }

    fn png_message() -> String {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(RgbImage::new(4, 4))
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        serde_json::to_string(&FrameMessage::from_image_bytes("image/png", &bytes)).unwrap()
    }

    #[test]
    fn no_hand_skips_the_classifier() {
        let classifier = Arc::new(CountingClassifier::default());
        let pipeline = FramePipeline::new(shared(FixedHand(LandmarkSet::empty())), classifier.clone());

        let response = pipeline.process_message(&png_message()).unwrap();
        assert_eq!(response, GestureResponse::no_hand());
        assert_eq!(classifier.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn detected_hand_is_classified_and_echoed() {
        let hand = LandmarkSet::from_array([Landmark::new(0.1, 0.2, 0.3); 21]);
        let classifier = Arc::new(CountingClassifier::default());
        let pipeline = FramePipeline::new(shared(FixedHand(hand)), classifier.clone());

        let response = pipeline.process_message(&png_message()).unwrap();
        assert_eq!(response.gesture, GestureLabel::Yes);
        assert_eq!(response.confidence, 0.42);
        assert_eq!(response.landmarks.len(), 21);
        assert_eq!(classifier.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn undecodable_image_is_a_decode_error() {
        let pipeline = FramePipeline::new(
            shared(FixedHand(LandmarkSet::empty())),
            Arc::new(RuleBasedClassifier::new()),
        );
        let text = serde_json::to_string(&FrameMessage::from_image_bytes("image/png", b"garbage")).unwrap();
        assert!(matches!(pipeline.process_message(&text), Err(FrameError::Decode(_))));
    }

    #[test]
    fn landmarker_failure_is_an_extraction_error() {
        let pipeline = FramePipeline::new(shared(FailingHand), Arc::new(RuleBasedClassifier::new()));
        let err = pipeline.process_message(&png_message()).unwrap_err();
        assert!(matches!(err, FrameError::Extraction(ref m) if m.contains("tracker crashed")));
    }

    /// Panics on its first frame, then reports a fixed hand.
    struct PanicsOnce {
        panicked: bool,
    }

    impl HandLandmarker for PanicsOnce {
        fn name(&self) -> String {
            "panics-once".to_string()
        }

        fn detect(&mut self, _frame: &RgbImage) -> anyhow::Result<LandmarkSet> {
            if !self.panicked {
                self.panicked = true;
                panic!("estimator blew up");
            }
            Ok(LandmarkSet::from_array([Landmark::new(0.1, 0.2, 0.3); 21]))
        }
    }

    #[test]
    fn panicking_estimator_does_not_wedge_later_frames() {
        let classifier = Arc::new(CountingClassifier::default());
        let pipeline = FramePipeline::new(shared(PanicsOnce { panicked: false }), classifier.clone());

        let first = pipeline.clone();
        let message = png_message();
        let crashed = std::thread::spawn(move || first.process_message(&message)).join();
        assert!(crashed.is_err());

        // The lock was released on unwind; a fresh clone still serves frames
        let response = pipeline.clone().process_message(&png_message()).unwrap();
        assert_eq!(response.gesture, GestureLabel::Yes);
        assert_eq!(classifier.0.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.landmarker_name(), "panics-once");
    }

    #[test]
    fn decode_message_stops_before_the_estimator() {
        assert!(matches!(decode_message("{}"), Err(FrameError::Decode(_))));
        let frame = decode_message(&png_message()).unwrap();
        assert_eq!(frame.dimensions(), (4, 4));
    }
}

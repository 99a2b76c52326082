//! JSON messages exchanged over the frame stream.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::FrameError;
use crate::types::{ClassificationResult, GestureLabel, Landmark, LandmarkSet};

/// Client → server, one per video frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMessage {
    /// Data-URL style `<prefix>,<base64 image bytes>`
    pub frame: String,
}

impl FrameMessage {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        serde_json::from_str(text).map_err(|e| FrameError::Decode(format!("bad frame message: {e}")))
    }

    /// Wraps encoded image bytes the way browser clients send them.
    pub fn from_image_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self {
            frame: format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
        }
    }

    /// Drops everything up to the first comma and decodes the rest.
    pub fn image_bytes(&self) -> Result<Vec<u8>, FrameError> {
        let (_prefix, payload) = self
            .frame
            .split_once(',')
            .ok_or_else(|| FrameError::Decode("frame payload has no ',' separator".to_string()))?;
        STANDARD
            .decode(payload.trim())
            .map_err(|e| FrameError::Decode(format!("invalid base64 payload: {e}")))
    }
}

/// Server → client, exactly one per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureResponse {
    pub landmarks: Vec<Landmark>,
    pub gesture: GestureLabel,
    pub confidence: f32,
}

impl GestureResponse {
    /// Answer for a frame with no hand in it.
    pub fn no_hand() -> Self {
        Self {
            landmarks: Vec::new(),
            gesture: GestureLabel::None,
            confidence: 0.0,
        }
    }

    pub fn new(landmarks: LandmarkSet, result: ClassificationResult) -> Self {
        Self {
            landmarks: landmarks.into_points(),
            gesture: result.label,
            confidence: result.confidence,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

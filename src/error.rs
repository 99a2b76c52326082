use std::path::PathBuf;

/// Failure to build a [`ModelClassifier`](crate::classifier::ModelClassifier) at startup.
///
/// Never reaches a connection: the selection policy falls back to the rule engine.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("model artifact not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("unsupported model kind: {0}")]
    UnsupportedKind(String),

    #[error("failed to deserialize {kind} model from {}: {reason}", .path.display())]
    Deserialize {
        kind: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("invalid {kind} model: {reason}")]
    Invalid { kind: &'static str, reason: String },
}

/// Everything that can go wrong while turning one frame message into a response.
///
/// Any variant ends the session that produced it.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame decode failed: {0}")]
    Decode(String),

    #[error("landmark extraction failed: {0}")]
    Extraction(String),

    #[error("classification failed: {0}")]
    Classification(String),

    #[error("frame processing exceeded {0} ms")]
    Timeout(u64),

    #[error("frame worker aborted: {0}")]
    Aborted(String),
}

impl FrameError {
    /// Short tag for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameError::Decode(_) => "decode",
            FrameError::Extraction(_) => "extraction",
            FrameError::Classification(_) => "classification",
            FrameError::Timeout(_) => "timeout",
            FrameError::Aborted(_) => "aborted",
        }
    }
}

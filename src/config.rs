use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub classifier: ClassifierConfig,
    pub landmarker: LandmarkerConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// "onnx" or "forest"
    pub kind: String,
    pub model_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkerConfig {
    pub model_path: String,
    pub min_detection_confidence: f32,
    pub intra_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Budget for decode + extract + classify of one frame. 0 disables it.
    pub frame_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kind: "onnx".to_string(),
            model_path: "models/asl_model.onnx".to_string(),
        }
    }
}

impl Default for LandmarkerConfig {
    fn default() -> Self {
        Self {
            model_path: "models/hand_landmark.onnx".to_string(),
            min_detection_confidence: 0.5,
            intra_threads: 4,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_timeout_ms: 2000,
        }
    }
}

impl SessionConfig {
    pub fn frame_timeout(&self) -> Option<Duration> {
        (self.frame_timeout_ms > 0).then(|| Duration::from_millis(self.frame_timeout_ms))
    }
}

impl AppConfig {
    pub const DEFAULT_PATH: &'static str = "config.json";

    /// Missing file or unparsable content both fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Configuration file {} not found. Using defaults.", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        // Missing fields take their defaults thanks to #[serde(default)]
        match serde_json::from_str::<AppConfig>(&content) {
            Ok(c) => {
                tracing::info!("Loaded configuration from {}", path.display());
                Ok(c)
            }
            Err(e) => {
                tracing::warn!("Error parsing config: {}. Loading defaults.", e);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("writing config {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

use clap::Parser;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = AppConfig::DEFAULT_PATH)]
    pub config: String,

    /// Address to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Gesture model kind (onnx, forest)
    #[arg(long)]
    pub model_kind: Option<String>,

    /// Gesture model artifact
    #[arg(long)]
    pub model_path: Option<String>,

    /// Hand landmark ONNX model
    #[arg(long)]
    pub landmark_model: Option<String>,

    /// Write the effective configuration back to --config
    #[arg(long)]
    pub write_config: bool,
}

impl Args {
    /// Command-line values win over the file.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(kind) = &self.model_kind {
            config.classifier.kind = kind.clone();
        }
        if let Some(path) = &self.model_path {
            config.classifier.model_path = path.clone();
        }
        if let Some(path) = &self.landmark_model {
            config.landmarker.model_path = path.clone();
        }
    }
}

//! Rusty Hands - real-time ASL gesture recognition service.
//!
//! Frames arrive over a WebSocket, a hand landmark model turns each one into
//! 21 keypoints, and the selected classifier (trained model or geometric
//! rules) labels the pose. Every frame gets exactly one response, in order.

pub mod args;
pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod landmarker;
pub mod pipeline;
pub mod protocol;
pub mod session;
pub mod streaming;
pub mod types;

pub use error::{FrameError, ModelLoadError};
pub use types::{ClassificationResult, GestureLabel, Landmark, LandmarkSet};

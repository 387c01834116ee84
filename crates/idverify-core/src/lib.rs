//! idverify-core — Face match decision and the ONNX face pipeline behind it.
//!
//! Uses SCRFD for face detection and ArcFace for face descriptors, both
//! running via ONNX Runtime, and decides whether two descriptors belong to
//! the same person by Euclidean distance against a threshold.

pub mod alignment;
pub mod analyzer;
pub mod detector;
pub mod frame;
pub mod matcher;
pub mod recognizer;
pub mod types;

use std::path::PathBuf;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxFaceAnalyzer};
pub use detector::{DetectorOptions, FaceDetector};
pub use frame::{CropRegion, Frame, FrameError};
pub use matcher::{compare, evaluate, MatchError, MatchOutcome, MatchReport, MatchThreshold};
pub use recognizer::FaceRecognizer;
pub use types::{BoundingBox, Detection, FaceDescriptor};

/// Default location of the ONNX model files: `$XDG_DATA_HOME/idverify/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("idverify/models")
}

//! Single-face analysis: detect the most confident face, then describe it.

use crate::detector::{DetectorError, DetectorOptions, FaceDetector};
use crate::frame::Frame;
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::Detection;
use std::path::Path;
use thiserror::Error;

pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Pluggable face analysis backend.
///
/// Returns at most one detection per frame; `Ok(None)` means no face was found.
pub trait FaceAnalyzer {
    fn analyze(&mut self, frame: &Frame) -> Result<Option<Detection>, AnalyzerError>;
}

/// SCRFD detection followed by ArcFace description.
pub struct OnnxFaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceAnalyzer {
    pub fn new(detector: FaceDetector, recognizer: FaceRecognizer) -> Self {
        Self { detector, recognizer }
    }

    /// Load both models from `model_dir` using their standard file names.
    pub fn load(model_dir: &Path, options: DetectorOptions) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_MODEL_FILE), options)?;
        let recognizer = FaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE), options.intra_threads)?;
        Ok(Self::new(detector, recognizer))
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn analyze(&mut self, frame: &Frame) -> Result<Option<Detection>, AnalyzerError> {
        let Some(face) = self.detector.detect_single(frame)? else {
            return Ok(None);
        };

        tracing::debug!(
            confidence = face.confidence,
            x = face.x,
            y = face.y,
            width = face.width,
            height = face.height,
            "face selected"
        );

        let descriptor = self.recognizer.extract(frame, &face)?;
        Ok(Some(Detection { face, descriptor }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reports_missing_detector_first() {
        let err = OnnxFaceAnalyzer::load(Path::new("/nonexistent/models"), DetectorOptions::default()).err();
        match err {
            Some(AnalyzerError::Detector(DetectorError::ModelNotFound(path))) => {
                assert!(path.ends_with(DETECTOR_MODEL_FILE), "path = {path}");
            }
            other => panic!("expected missing detector model, got {other:?}"),
        }
    }
}

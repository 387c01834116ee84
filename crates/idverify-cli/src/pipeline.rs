//! Two-image verification: load, analyze, compare.

use crate::engine::EngineHandle;
use idverify_core::frame::{self, Frame, FrameError};
use idverify_core::{compare, Detection, FaceDescriptor, MatchError, MatchReport, MatchThreshold};
use image::DynamicImage;
use std::path::PathBuf;

pub const ID_CARD: &str = "ID Card";
pub const SELFIE: &str = "Selfie";

/// What one input image produced.
pub struct Inspection {
    pub label: &'static str,
    /// Decoded source image, kept for cropping.
    pub image: Option<DynamicImage>,
    pub detection: Option<Detection>,
}

impl Inspection {
    pub fn descriptor(&self) -> Option<&FaceDescriptor> {
        self.detection.as_ref().map(|d| &d.descriptor)
    }
}

pub struct Verification {
    pub id_card: Inspection,
    pub selfie: Inspection,
    pub report: MatchReport,
}

/// Decode and analyze one image.
///
/// Every failure is logged and becomes an absent detection.
pub async fn inspect(engine: &EngineHandle, label: &'static str, path: PathBuf) -> Inspection {
    let decoded = tokio::task::spawn_blocking(move || {
        let image = frame::load_image(&path)?;
        let frame = Frame::from_image(&image);
        Ok::<_, FrameError>((image, frame))
    })
    .await;

    let (image, frame) = match decoded {
        Ok(Ok(loaded)) => loaded,
        Ok(Err(err)) => {
            tracing::error!(image = label, %err, "failed to load image");
            return Inspection { label, image: None, detection: None };
        }
        Err(err) => {
            tracing::error!(image = label, %err, "image decoding task failed");
            return Inspection { label, image: None, detection: None };
        }
    };

    let detection = match engine.analyze(label, frame).await {
        Ok(Some(detection)) => {
            tracing::info!(image = label, confidence = detection.face.confidence, "face detected");
            Some(detection)
        }
        Ok(None) => {
            tracing::info!(image = label, "no face detected");
            None
        }
        Err(err) => {
            tracing::error!(image = label, %err, "error detecting face");
            None
        }
    };

    Inspection { label, image: Some(image), detection }
}

/// Inspect both images concurrently and compare their descriptors.
pub async fn verify(
    engine: &EngineHandle,
    id_card: PathBuf,
    selfie: PathBuf,
    threshold: MatchThreshold,
) -> Result<Verification, MatchError> {
    let (id_card, selfie) = tokio::join!(
        inspect(engine, ID_CARD, id_card),
        inspect(engine, SELFIE, selfie),
    );

    let report = compare(id_card.descriptor(), selfie.descriptor(), threshold)?;
    tracing::info!(outcome = ?report.outcome, distance = ?report.distance, "verification complete");

    Ok(Verification { id_card, selfie, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spawn_engine;
    use crate::engine::tests::BrightnessAnalyzer;
    use idverify_core::MatchOutcome;
    use image::{GrayImage, Luma};
    use std::path::Path;
    use tempfile::TempDir;

    fn write_gray(dir: &Path, name: &str, value: u8) -> PathBuf {
        let path = dir.join(name);
        GrayImage::from_pixel(8, 8, Luma([value])).save(&path).unwrap();
        path
    }

    fn threshold(value: f32) -> MatchThreshold {
        MatchThreshold::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_verify_match() {
        let dir = TempDir::new().unwrap();
        let id = write_gray(dir.path(), "id.png", 200);
        let selfie = write_gray(dir.path(), "selfie.png", 210);
        let engine = spawn_engine(BrightnessAnalyzer).unwrap();

        let v = verify(&engine, id, selfie, threshold(0.6)).await.unwrap();
        assert_eq!(v.report.outcome, MatchOutcome::Match);
        assert!(v.id_card.image.is_some());
        assert_eq!(v.id_card.label, ID_CARD);
        assert_eq!(v.selfie.label, SELFIE);
    }

    #[tokio::test]
    async fn test_verify_no_match() {
        let dir = TempDir::new().unwrap();
        let id = write_gray(dir.path(), "id.png", 255);
        let selfie = write_gray(dir.path(), "selfie.png", 20);
        let engine = spawn_engine(BrightnessAnalyzer).unwrap();

        let v = verify(&engine, id, selfie, threshold(0.6)).await.unwrap();
        assert_eq!(v.report.outcome, MatchOutcome::NoMatch);
        assert!(v.report.distance.unwrap() > 0.6);
    }

    #[tokio::test]
    async fn test_verify_no_face_is_indeterminate() {
        let dir = TempDir::new().unwrap();
        let id = write_gray(dir.path(), "id.png", 0);
        let selfie = write_gray(dir.path(), "selfie.png", 200);
        let engine = spawn_engine(BrightnessAnalyzer).unwrap();

        let v = verify(&engine, id, selfie, threshold(0.6)).await.unwrap();
        assert_eq!(v.report.outcome, MatchOutcome::Indeterminate);
        assert!(v.id_card.detection.is_none());
        assert!(v.selfie.detection.is_some());
    }

    #[tokio::test]
    async fn test_verify_unreadable_image_is_indeterminate() {
        let dir = TempDir::new().unwrap();
        let selfie = write_gray(dir.path(), "selfie.png", 200);
        let garbage = dir.path().join("id.png");
        std::fs::write(&garbage, b"not a png").unwrap();
        let engine = spawn_engine(BrightnessAnalyzer).unwrap();

        let v = verify(&engine, garbage, selfie.clone(), threshold(0.6)).await.unwrap();
        assert_eq!(v.report.outcome, MatchOutcome::Indeterminate);
        assert!(v.id_card.image.is_none());

        let v = verify(&engine, dir.path().join("missing.png"), selfie, threshold(0.6)).await.unwrap();
        assert_eq!(v.report.outcome, MatchOutcome::Indeterminate);
    }

    #[tokio::test]
    async fn test_sequential_and_concurrent_agree() {
        let dir = TempDir::new().unwrap();
        let id = write_gray(dir.path(), "id.png", 180);
        let selfie = write_gray(dir.path(), "selfie.png", 90);
        let engine = spawn_engine(BrightnessAnalyzer).unwrap();

        let concurrent = verify(&engine, id.clone(), selfie.clone(), threshold(0.6)).await.unwrap();

        let a = inspect(&engine, ID_CARD, id).await;
        let b = inspect(&engine, SELFIE, selfie).await;
        let sequential = compare(a.descriptor(), b.descriptor(), threshold(0.6)).unwrap();

        assert_eq!(concurrent.report, sequential);
    }
}

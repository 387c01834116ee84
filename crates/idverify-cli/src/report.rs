//! Presentation: user-facing messages, JSON output, and face crops.

use crate::pipeline::{Inspection, Verification};
use anyhow::{Context, Result};
use idverify_core::frame::crop_face;
use idverify_core::{BoundingBox, MatchOutcome, MatchReport};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const FACES_MATCH: &str = "The faces match!";
pub const FACES_DIFFER: &str = "The faces do not match.";
pub const FACES_MISSING: &str = "Could not detect faces in both images.";
pub const DETECTION_ERROR: &str = "An error occurred during face detection.";

pub fn outcome_message(outcome: MatchOutcome) -> &'static str {
    match outcome {
        MatchOutcome::Match => FACES_MATCH,
        MatchOutcome::NoMatch => FACES_DIFFER,
        MatchOutcome::Indeterminate => FACES_MISSING,
    }
}

#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub message: &'static str,
    #[serde(flatten)]
    pub report: &'a MatchReport,
    pub id_card: Option<&'a BoundingBox>,
    pub selfie: Option<&'a BoundingBox>,
    pub crops: &'a [PathBuf],
}

impl<'a> JsonReport<'a> {
    pub fn new(verification: &'a Verification, crops: &'a [PathBuf]) -> Self {
        Self {
            message: outcome_message(verification.report.outcome),
            report: &verification.report,
            id_card: verification.id_card.detection.as_ref().map(|d| &d.face),
            selfie: verification.selfie.detection.as_ref().map(|d| &d.face),
            crops,
        }
    }
}

/// "ID Card" → "id_card_face.png"
fn crop_file_name(label: &str) -> String {
    let stem: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{stem}_face.png")
}

fn write_crop(dir: &Path, inspection: &Inspection) -> Result<Option<PathBuf>> {
    let (Some(image), Some(detection)) = (&inspection.image, &inspection.detection) else {
        return Ok(None);
    };
    let Some(crop) = crop_face(image, &detection.face) else {
        tracing::warn!(image = inspection.label, "face box lies outside the image; no crop written");
        return Ok(None);
    };

    let path = dir.join(crop_file_name(inspection.label));
    crop.save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(image = inspection.label, path = %path.display(), "face crop written");
    Ok(Some(path))
}

/// Write the detected face regions of both images as PNG files.
pub fn write_crops(dir: &Path, verification: &Verification) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut written = Vec::new();
    for inspection in [&verification.id_card, &verification.selfie] {
        written.extend(write_crop(dir, inspection)?);
    }
    Ok(written)
}

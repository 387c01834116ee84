//! Face match decision: Euclidean distance against a fixed threshold.

use crate::types::FaceDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Distance below which two descriptors are treated as the same person.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("descriptor length mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
    #[error("match threshold must be finite and greater than zero, got {0}")]
    InvalidThreshold(f32),
}

/// Maximum Euclidean distance (exclusive) that still counts as a match.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct MatchThreshold(f32);

impl MatchThreshold {
    pub fn new(value: f32) -> Result<Self, MatchError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(MatchError::InvalidThreshold(value))
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for MatchThreshold {
    fn default() -> Self {
        Self(DEFAULT_MATCH_THRESHOLD)
    }
}

impl TryFrom<f32> for MatchThreshold {
    type Error = MatchError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MatchThreshold> for f32 {
    fn from(threshold: MatchThreshold) -> Self {
        threshold.0
    }
}

impl fmt::Display for MatchThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Match,
    NoMatch,
    /// At least one image yielded no detection.
    Indeterminate,
}

/// Outcome of a comparison together with the distance that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub outcome: MatchOutcome,
    /// `None` when the outcome is [`MatchOutcome::Indeterminate`].
    pub distance: Option<f32>,
    pub threshold: MatchThreshold,
}

/// Euclidean distance between two descriptors of equal length.
///
/// Squares are accumulated left to right in `f32` so results are
/// reproducible bit-for-bit.
pub fn euclidean_distance(a: &FaceDescriptor, b: &FaceDescriptor) -> Result<f32, MatchError> {
    if a.len() != b.len() {
        return Err(MatchError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let sum = a
        .values
        .iter()
        .zip(b.values.iter())
        .fold(0.0f32, |acc, (x, y)| acc + (x - y).powi(2));

    Ok(sum.sqrt())
}

/// Compare two optional descriptors and report the distance with the outcome.
pub fn compare(
    a: Option<&FaceDescriptor>,
    b: Option<&FaceDescriptor>,
    threshold: MatchThreshold,
) -> Result<MatchReport, MatchError> {
    let (Some(a), Some(b)) = (a, b) else {
        return Ok(MatchReport {
            outcome: MatchOutcome::Indeterminate,
            distance: None,
            threshold,
        });
    };

    let distance = euclidean_distance(a, b)?;
    let outcome = if distance < threshold.value() {
        MatchOutcome::Match
    } else {
        MatchOutcome::NoMatch
    };

    tracing::debug!(distance, threshold = threshold.value(), ?outcome, "descriptors compared");

    Ok(MatchReport {
        outcome,
        distance: Some(distance),
        threshold,
    })
}

/// Decide whether two optional descriptors belong to the same face.
pub fn evaluate(
    a: Option<&FaceDescriptor>,
    b: Option<&FaceDescriptor>,
    threshold: MatchThreshold,
) -> Result<MatchOutcome, MatchError> {
    compare(a, b, threshold).map(|report| report.outcome)
}

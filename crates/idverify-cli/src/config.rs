use idverify_core::detector::{DetectorOptions, DEFAULT_MIN_CONFIDENCE, DEFAULT_NMS_THRESHOLD};
use idverify_core::MatchThreshold;
use std::path::PathBuf;

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing det_10g.onnx and w600k_r50.onnx.
    pub model_dir: PathBuf,
    /// Euclidean distance below which two faces match.
    pub match_threshold: MatchThreshold,
    /// Minimum SCRFD score for a face to count as detected.
    pub min_confidence: f32,
    /// ONNX Runtime intra-op threads per model.
    pub intra_threads: usize,
}

impl Config {
    /// Load configuration from `IDVERIFY_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = lookup("IDVERIFY_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(idverify_core::default_model_dir);

        let match_threshold = match parse::<f32>(&lookup, "IDVERIFY_MATCH_THRESHOLD") {
            Some(value) => MatchThreshold::new(value).unwrap_or_else(|err| {
                tracing::warn!(%err, "ignoring IDVERIFY_MATCH_THRESHOLD");
                MatchThreshold::default()
            }),
            None => MatchThreshold::default(),
        };

        let min_confidence = match parse::<f32>(&lookup, "IDVERIFY_MIN_CONFIDENCE") {
            Some(value) if value.is_finite() && (0.0..1.0).contains(&value) => value,
            Some(value) => {
                tracing::warn!(value, "ignoring IDVERIFY_MIN_CONFIDENCE: must lie in [0, 1)");
                DEFAULT_MIN_CONFIDENCE
            }
            None => DEFAULT_MIN_CONFIDENCE,
        };

        Self {
            model_dir,
            match_threshold,
            min_confidence,
            intra_threads: parse(&lookup, "IDVERIFY_INTRA_THREADS")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(2),
        }
    }

    pub fn detector_options(&self) -> DetectorOptions {
        DetectorOptions {
            min_confidence: self.min_confidence,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            intra_threads: self.intra_threads,
        }
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.match_threshold, MatchThreshold::default());
        assert_eq!(config.min_confidence, DEFAULT_MIN_CONFIDENCE);
        assert_eq!(config.intra_threads, 2);
        assert!(config.model_dir.ends_with("idverify/models"));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("IDVERIFY_MODEL_DIR", "/opt/models"),
            ("IDVERIFY_MATCH_THRESHOLD", "0.45"),
            ("IDVERIFY_MIN_CONFIDENCE", "0.7"),
            ("IDVERIFY_INTRA_THREADS", "4"),
        ]);
        assert_eq!(config.model_dir, PathBuf::from("/opt/models"));
        assert_eq!(config.match_threshold.value(), 0.45);
        assert_eq!(config.min_confidence, 0.7);
        assert_eq!(config.detector_options().intra_threads, 4);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("IDVERIFY_MATCH_THRESHOLD", "-1"),
            ("IDVERIFY_MIN_CONFIDENCE", "high"),
            ("IDVERIFY_INTRA_THREADS", "0"),
        ]);
        assert_eq!(config.match_threshold, MatchThreshold::default());
        assert_eq!(config.min_confidence, DEFAULT_MIN_CONFIDENCE);
        assert_eq!(config.intra_threads, 2);

        for bad in ["NaN", "inf", "1.5", "-0.2"] {
            let config = config_from(&[("IDVERIFY_MIN_CONFIDENCE", bad)]);
            assert_eq!(config.min_confidence, DEFAULT_MIN_CONFIDENCE, "accepted {bad}");
        }
    }
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use idverify_core::{MatchOutcome, MatchThreshold, OnnxFaceAnalyzer};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod pipeline;
mod report;

use config::Config;
use engine::{spawn_engine, EngineHandle};

#[derive(Parser)]
#[command(name = "idverify", version, about = "Check whether an ID-card photo and a selfie show the same face")]
struct Cli {
    /// Directory containing det_10g.onnx and w600k_r50.onnx
    /// [env: IDVERIFY_MODEL_DIR]
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the face on an ID card with the face on a selfie
    Compare {
        /// ID-card photo
        id_card: PathBuf,
        /// Selfie photo
        selfie: PathBuf,
        /// Maximum descriptor distance counted as a match [env: IDVERIFY_MATCH_THRESHOLD]
        #[arg(short, long, value_parser = parse_threshold)]
        threshold: Option<MatchThreshold>,
        /// Write the detected face crops into this directory
        #[arg(long)]
        crops: Option<PathBuf>,
        /// Print a JSON report instead of a sentence
        #[arg(long)]
        json: bool,
    },
    /// Detect the most prominent face in a single image
    Detect {
        image: PathBuf,
    },
}

fn parse_threshold(s: &str) -> Result<MatchThreshold, String> {
    let value: f32 = s.parse().map_err(|e| format!("{e}"))?;
    MatchThreshold::new(value).map_err(|e| e.to_string())
}

fn start_engine(config: &Config) -> Result<EngineHandle> {
    let analyzer = OnnxFaceAnalyzer::load(&config.model_dir, config.detector_options())
        .with_context(|| format!("failed to load models from {}", config.model_dir.display()))?;
    Ok(spawn_engine(analyzer)?)
}

/// Start the engine, telling the user detection failed if the models cannot be loaded.
fn start_engine_or_report(config: &Config) -> Result<EngineHandle> {
    start_engine(config).map_err(|err| {
        println!("{}", report::DETECTION_ERROR);
        err
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }

    match cli.command {
        Commands::Compare {
            id_card,
            selfie,
            threshold,
            crops,
            json,
        } => {
            if let Some(threshold) = threshold {
                config.match_threshold = threshold;
            }
            tracing::debug!(?config, "configuration loaded");

            let engine = start_engine_or_report(&config)?;

            let verification = match pipeline::verify(&engine, id_card, selfie, config.match_threshold).await {
                Ok(verification) => verification,
                Err(err) => {
                    println!("{}", report::DETECTION_ERROR);
                    return Err(err.into());
                }
            };

            let written = match &crops {
                Some(dir) if verification.report.outcome != MatchOutcome::Indeterminate => {
                    report::write_crops(dir, &verification)?
                }
                _ => Vec::new(),
            };

            if json {
                let out = report::JsonReport::new(&verification, &written);
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", report::outcome_message(verification.report.outcome));
            }
        }
        Commands::Detect { image } => {
            let engine = start_engine_or_report(&config)?;
            let inspection = pipeline::inspect(&engine, "Image", image).await;
            match inspection.detection {
                Some(detection) => {
                    let face = &detection.face;
                    println!(
                        "Face at x={:.1} y={:.1} width={:.1} height={:.1} (confidence {:.3}), descriptor length {}",
                        face.x,
                        face.y,
                        face.width,
                        face.height,
                        face.confidence,
                        detection.descriptor.len()
                    );
                }
                None => println!("No face detected"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compare() {
        let cli = Cli::try_parse_from([
            "idverify", "compare", "id.png", "selfie.jpeg", "--threshold", "0.5", "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Compare { id_card, threshold, json, crops, .. } => {
                assert_eq!(id_card, PathBuf::from("id.png"));
                assert_eq!(threshold.map(MatchThreshold::value), Some(0.5));
                assert!(json);
                assert!(crops.is_none());
            }
            Commands::Detect { .. } => panic!("expected compare"),
        }
    }

    #[test]
    fn test_rejects_invalid_threshold() {
        assert!(Cli::try_parse_from(["idverify", "compare", "a.png", "b.png", "-t", "0"]).is_err());
        assert!(Cli::try_parse_from(["idverify", "compare", "a.png", "b.png", "-t", "abc"]).is_err());
    }

    #[test]
    fn test_missing_models_fail_engine_start() {
        let mut config = Config::from_env();
        config.model_dir = PathBuf::from("/nonexistent/idverify-models");
        let err = start_engine_or_report(&config).err().unwrap();
        assert!(err.to_string().contains("/nonexistent/idverify-models"), "{err:#}");
    }

    #[test]
    fn test_global_model_dir() {
        let cli = Cli::try_parse_from(["idverify", "detect", "face.jpg", "--model-dir", "/opt/models"]).unwrap();
        assert_eq!(cli.model_dir, Some(PathBuf::from("/opt/models")));
    }
}

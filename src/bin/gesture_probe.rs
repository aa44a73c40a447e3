//! gesture_probe - classify hand gestures in still images
//!
//! Runs the landmark and classifier backends once per image and prints
//! handedness, gesture and confidence for every detected hand. Nothing is
//! debounced or dispatched.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use gesture_relay::detect::{build_classifier, build_landmarker, label_name, HandFeatures};
use gesture_relay::ingest::{FrameStream, ImageFileConfig, ImageFileSource};
use gesture_relay::RelayConfig;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Classify hand gestures in still images")]
struct Args {
    /// Images to classify (JPEG or PNG).
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// JSON config file; only the backend section is used.
    #[arg(long, env = "GESTURE_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Landmark backend: stub or tract.
    #[arg(long)]
    landmarker: Option<String>,

    /// ONNX hand landmark model (tract backend).
    #[arg(long)]
    landmark_model: Option<PathBuf>,

    /// Classifier backend: stub or linear.
    #[arg(long)]
    classifier: Option<String>,

    /// JSON weights for the linear classifier.
    #[arg(long)]
    classifier_model: Option<PathBuf>,

    /// Output style: auto, plain, pretty.
    #[arg(long, default_value = "auto")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let mut cfg = RelayConfig::load_from(args.config.as_deref())?;
    if let Some(name) = args.landmarker {
        cfg.backend.landmarker = name;
    }
    if let Some(path) = args.landmark_model {
        cfg.backend.landmark_model = Some(path);
    }
    if let Some(name) = args.classifier {
        cfg.backend.classifier = name;
    }
    if let Some(path) = args.classifier_model {
        cfg.backend.classifier_model = Some(path);
    }
    cfg.backend.validate()?;

    let (mut landmarker, classifier) = {
        let _stage = ui.stage("Load backends");
        let mut landmarker = build_landmarker(&cfg.backend)?;
        landmarker.warm_up()?;
        (landmarker, build_classifier(&cfg.backend)?)
    };

    let mut images = ImageFileSource::new(ImageFileConfig {
        paths: args.images.clone(),
    })?;
    images.open()?;

    let progress = ui.progress(args.images.len() as u64);
    while images.remaining() > 0 {
        let frame = images.read_frame();
        let path = images
            .current_path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        progress.set_message(path.clone());

        // Stills are classified as the live camera sees them, mirrored.
        let frame = match frame.and_then(|frame| frame.mirrored()) {
            Ok(frame) => frame,
            Err(err) => {
                progress.suspend(|| println!("{}: {:#}", path, err));
                progress.inc(1);
                continue;
            }
        };

        let hands = landmarker
            .detect(&frame)
            .with_context(|| format!("landmark {}", path))?;
        if hands.is_empty() {
            progress.suspend(|| println!("{}: no hand", path));
        }
        for hand in &hands {
            let line = match HandFeatures::from_observation(hand)
                .and_then(|features| classifier.classify(&features))
                .and_then(|c| label_name(c.label_index).map(|label| (label, c.confidence)))
            {
                Ok((label, confidence)) => format!(
                    "{}: hand {} {} -> {} ({:.2})",
                    path,
                    hand.hand_index,
                    hand.handedness.as_str(),
                    label,
                    confidence
                ),
                Err(err) => format!("{}: hand {} unclassified: {:#}", path, hand.hand_index, err),
            };
            progress.suspend(|| println!("{}", line));
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    images.release();
    Ok(())
}

//! gesture_relay - stream-to-consumer gesture relay daemon
//!
//! This daemon:
//! 1. Reads frames from the configured stream, reconnecting as needed
//! 2. Classifies hand gestures at the configured processing rate
//! 3. Debounces per-frame labels into confirmed gestures
//! 4. Pushes each confirmed gesture to the consumer, with retries
//!
//! Runs until Ctrl-C.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use gesture_relay::{run_relay, LowConfidencePolicy, RelayConfig, ShutdownSignal};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Relay debounced hand gestures from a video stream to a remote consumer"
)]
struct Args {
    /// JSON config file. Flags below override it.
    #[arg(long, env = "GESTURE_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Upstream stream URL (rtmp://, rtsp://, file://, or stub:// for a synthetic stream).
    #[arg(long)]
    stream_url: Option<String>,

    /// Consumer URL (ws://host:port or mqtt://host:port/topic).
    #[arg(long)]
    consumer_url: Option<String>,

    /// Minimum time between classified frames, in milliseconds.
    #[arg(long)]
    process_interval_ms: Option<u64>,

    /// Consecutive identical labels required to confirm a gesture.
    #[arg(long)]
    confirm_frames: Option<usize>,

    /// Minimum classifier confidence for an observation to count.
    #[arg(long)]
    min_confidence: Option<f32>,

    /// Minimum time before the same gesture may fire again, in milliseconds.
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// What a low-confidence observation does to the streak: hold or reset.
    #[arg(long)]
    low_confidence: Option<LowConfidencePolicy>,

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
}

impl Args {
    fn apply(self, cfg: &mut RelayConfig) {
        if let Some(url) = self.stream_url {
            cfg.stream.url = url;
        }
        if let Some(url) = self.consumer_url {
            cfg.dispatch.consumer_url = url;
        }
        if let Some(ms) = self.process_interval_ms {
            cfg.process_interval = Duration::from_millis(ms);
        }
        if let Some(k) = self.confirm_frames {
            cfg.stabilizer.confirm_frames = k;
        }
        if let Some(value) = self.min_confidence {
            cfg.stabilizer.min_confidence = value;
        }
        if let Some(ms) = self.cooldown_ms {
            cfg.stabilizer.cooldown = Duration::from_millis(ms);
        }
        if let Some(policy) = self.low_confidence {
            cfg.stabilizer.low_confidence = policy;
        }
        if let Some(name) = self.landmarker {
            cfg.backend.landmarker = name;
        }
        if let Some(path) = self.landmark_model {
            cfg.backend.landmark_model = Some(path);
        }
        if let Some(name) = self.classifier {
            cfg.backend.classifier = name;
        }
        if let Some(path) = self.classifier_model {
            cfg.backend.classifier_model = Some(path);
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = RelayConfig::load_from(args.config.as_deref())?;
    args.apply(&mut cfg);
    cfg.validate()?;

    let shutdown = ShutdownSignal::new();
    let handler_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received, stopping relay...");
        handler_signal.request();
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("gesture_relay {} starting", env!("CARGO_PKG_VERSION"));
    run_relay(&cfg, &shutdown)?;
    Ok(())
}

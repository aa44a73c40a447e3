use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::detect::BackendSettings;
use crate::dispatch::{RetryPolicy, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::frame::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use crate::ingest::supervisor::DEFAULT_RECONNECT_DELAY;
use crate::stabilizer::{
    LowConfidencePolicy, StabilizerConfig, DEFAULT_CONFIRM_FRAMES, DEFAULT_COOLDOWN,
    DEFAULT_MIN_CONFIDENCE,
};
use crate::throttle::DEFAULT_PROCESS_INTERVAL;

const DEFAULT_STREAM_URL: &str = "stub://camera";
const DEFAULT_CONSUMER_URL: &str = "ws://127.0.0.1:3000";

pub const CONFIG_ENV: &str = "GESTURE_RELAY_CONFIG";

#[derive(Debug, Deserialize, Default)]
struct RelayConfigFile {
    stream: Option<StreamConfigFile>,
    throttle: Option<ThrottleConfigFile>,
    stabilizer: Option<StabilizerConfigFile>,
    dispatch: Option<DispatchConfigFile>,
    backend: Option<BackendConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    url: Option<String>,
    reconnect_delay_ms: Option<u64>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ThrottleConfigFile {
    process_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct StabilizerConfigFile {
    min_confidence: Option<f32>,
    confirm_frames: Option<usize>,
    cooldown_ms: Option<u64>,
    low_confidence: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DispatchConfigFile {
    consumer_url: Option<String>,
    retry_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct BackendConfigFile {
    landmarker: Option<String>,
    landmark_model: Option<PathBuf>,
    classifier: Option<String>,
    classifier_model: Option<PathBuf>,
    stub_gesture: Option<String>,
    stub_confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub stream: StreamSettings,
    pub process_interval: Duration,
    pub stabilizer: StabilizerConfig,
    pub dispatch: DispatchSettings,
    pub backend: BackendSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub url: String,
    pub reconnect_delay: Duration,
    /// Working size frames are normalized to.
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    pub consumer_url: String,
    pub retry: RetryPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            stream: StreamSettings {
                url: DEFAULT_STREAM_URL.to_string(),
                reconnect_delay: DEFAULT_RECONNECT_DELAY,
                width: DEFAULT_FRAME_WIDTH,
                height: DEFAULT_FRAME_HEIGHT,
            },
            process_interval: DEFAULT_PROCESS_INTERVAL,
            stabilizer: StabilizerConfig::default(),
            dispatch: DispatchSettings {
                consumer_url: DEFAULT_CONSUMER_URL.to_string(),
                retry: RetryPolicy::default(),
            },
            backend: BackendSettings::default(),
        }
    }
}

impl RelayConfig {
    /// Defaults, then the file named by `GESTURE_RELAY_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Same as `load`, with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RelayConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let stream = file.stream.unwrap_or_default();
        let stream = StreamSettings {
            url: stream.url.unwrap_or(defaults.stream.url),
            reconnect_delay: stream
                .reconnect_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RECONNECT_DELAY),
            width: stream.width.unwrap_or(DEFAULT_FRAME_WIDTH),
            height: stream.height.unwrap_or(DEFAULT_FRAME_HEIGHT),
        };

        let process_interval = file
            .throttle
            .and_then(|throttle| throttle.process_interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PROCESS_INTERVAL);

        let stabilizer = file.stabilizer.unwrap_or_default();
        let stabilizer = StabilizerConfig {
            min_confidence: stabilizer.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            confirm_frames: stabilizer.confirm_frames.unwrap_or(DEFAULT_CONFIRM_FRAMES),
            cooldown: stabilizer
                .cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_COOLDOWN),
            low_confidence: match stabilizer.low_confidence.as_deref() {
                Some(policy) => LowConfidencePolicy::from_str(policy)?,
                None => LowConfidencePolicy::default(),
            },
        };

        let dispatch = file.dispatch.unwrap_or_default();
        let dispatch = DispatchSettings {
            consumer_url: dispatch
                .consumer_url
                .unwrap_or(defaults.dispatch.consumer_url),
            retry: RetryPolicy {
                attempts: dispatch.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS),
                delay: dispatch
                    .retry_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_RETRY_DELAY),
            },
        };

        let backend = file.backend.unwrap_or_default();
        let backend = BackendSettings {
            landmarker: backend.landmarker.unwrap_or(defaults.backend.landmarker),
            landmark_model: backend.landmark_model,
            classifier: backend.classifier.unwrap_or(defaults.backend.classifier),
            classifier_model: backend.classifier_model,
            stub_gesture: backend.stub_gesture.unwrap_or(defaults.backend.stub_gesture),
            stub_confidence: backend
                .stub_confidence
                .unwrap_or(defaults.backend.stub_confidence),
        };

        Ok(Self {
            stream,
            process_interval,
            stabilizer,
            dispatch,
            backend,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = env_string("GESTURE_RELAY_STREAM_URL") {
            self.stream.url = url;
        }
        if let Some(url) = env_string("GESTURE_RELAY_CONSUMER_URL") {
            self.dispatch.consumer_url = url;
        }
        if let Some(ms) = env_parse::<u64>("GESTURE_RELAY_PROCESS_INTERVAL_MS")? {
            self.process_interval = Duration::from_millis(ms);
        }
        if let Some(value) = env_parse::<f32>("GESTURE_RELAY_MIN_CONFIDENCE")? {
            self.stabilizer.min_confidence = value;
        }
        if let Some(value) = env_parse::<usize>("GESTURE_RELAY_CONFIRM_FRAMES")? {
            self.stabilizer.confirm_frames = value;
        }
        if let Some(ms) = env_parse::<u64>("GESTURE_RELAY_COOLDOWN_MS")? {
            self.stabilizer.cooldown = Duration::from_millis(ms);
        }
        if let Some(value) = env_parse::<u32>("GESTURE_RELAY_RETRY_ATTEMPTS")? {
            self.dispatch.retry.attempts = value;
        }
        if let Some(ms) = env_parse::<u64>("GESTURE_RELAY_RETRY_DELAY_MS")? {
            self.dispatch.retry.delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("GESTURE_RELAY_RECONNECT_DELAY_MS")? {
            self.stream.reconnect_delay = Duration::from_millis(ms);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream.url.trim().is_empty() {
            return Err(anyhow!("stream url must not be empty"));
        }
        if self.stream.width == 0 || self.stream.height == 0 {
            return Err(anyhow!("stream frame size must be non-zero"));
        }
        if self.dispatch.consumer_url.trim().is_empty() {
            return Err(anyhow!("consumer url must not be empty"));
        }
        self.stabilizer.validate()?;
        self.dispatch.retry.validate()?;
        self.backend.validate()?;
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env_string(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} has an invalid value: {}", key, value)),
        None => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<RelayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

//! Failure taxonomy for the relay loop.
//!
//! None of these are fatal. Each one maps to a local recovery path:
//! - `StreamUnavailable`: wait the reconnect delay, then reopen
//! - `FrameReadFailure`: release the stream and reopen immediately
//! - `ClassificationFailure`: drop this frame's observation, keep the streak
//! - `DispatchFailure`: retry up to the bound, then drop the event
//!
//! Values travel inside `anyhow::Error` and can be recovered with
//! `downcast_ref::<RelayError>()`.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayError {
    StreamUnavailable { source: String, reason: String },
    FrameReadFailure { source: String, reason: String },
    ClassificationFailure { reason: String },
    DispatchFailure { endpoint: String, reason: String },
}

impl RelayError {
    /// Stable code for log lines and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::StreamUnavailable { .. } => "STREAM_UNAVAILABLE",
            RelayError::FrameReadFailure { .. } => "FRAME_READ_FAILURE",
            RelayError::ClassificationFailure { .. } => "CLASSIFICATION_FAILURE",
            RelayError::DispatchFailure { .. } => "DISPATCH_FAILURE",
        }
    }

    pub(crate) fn stream_unavailable(source: &str, err: &anyhow::Error) -> Self {
        RelayError::StreamUnavailable {
            source: source.to_string(),
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn frame_read(source: &str, err: &anyhow::Error) -> Self {
        RelayError::FrameReadFailure {
            source: source.to_string(),
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn classification(err: &anyhow::Error) -> Self {
        RelayError::ClassificationFailure {
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn dispatch(endpoint: &str, err: &anyhow::Error) -> Self {
        RelayError::DispatchFailure {
            endpoint: endpoint.to_string(),
            reason: format!("{err:#}"),
        }
    }
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::StreamUnavailable { source, reason } => {
                write!(f, "{}: {} ({})", self.code(), source, reason)
            }
            RelayError::FrameReadFailure { source, reason } => {
                write!(f, "{}: {} ({})", self.code(), source, reason)
            }
            RelayError::ClassificationFailure { reason } => {
                write!(f, "{}: {}", self.code(), reason)
            }
            RelayError::DispatchFailure { endpoint, reason } => {
                write!(f, "{}: {} ({})", self.code(), endpoint, reason)
            }
        }
    }
}

impl std::error::Error for RelayError {}

use std::fmt;
use std::time::Duration;

use bridge_core::FrameError;

/// Failure of one model backend, or of the whole fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct InvokeError {
    pub kind: FailureKind,
    pub message: String,
}

impl InvokeError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ModelUnavailable, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    ModelUnavailable,
    Timeout { after: Duration },
    NonZeroExit { code: Option<i32> },
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ModelUnavailable => write!(f, "model unavailable"),
            FailureKind::Timeout { after } => write!(f, "timed out after {}", budget(*after)),
            FailureKind::NonZeroExit { code: Some(code) } => {
                write!(f, "model process exited with status {code}")
            }
            FailureKind::NonZeroExit { code: None } => {
                write!(f, "model process terminated by signal")
            }
            FailureKind::Io => write!(f, "i/o error"),
        }
    }
}

/// Whole seconds as `120s`, anything finer as milliseconds.
pub(crate) fn budget(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Per-request failure, reported to the UI as `{success: false, error}`.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::InvalidRequest(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("failed to read from the UI channel: {0}")]
    Read(#[source] FrameError),
    #[error("failed to write to the UI channel: {0}")]
    Write(#[source] FrameError),
    #[error("writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_reports_sub_second_budgets() {
        let whole = FailureKind::Timeout {
            after: Duration::from_secs(120),
        };
        let short = FailureKind::Timeout {
            after: Duration::from_millis(500),
        };
        assert_eq!(whole.to_string(), "timed out after 120s");
        assert_eq!(short.to_string(), "timed out after 500ms");
    }
}

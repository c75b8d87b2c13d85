use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bridge_core::{ProgressStage, ProgressUpdate};
use bridge_logging::{bridge_debug, bridge_info, bridge_warn};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::api::ApiBackend;
use crate::cli::CliBackend;
use crate::InvokeError;

/// Per-request progress buffer. Beyond this the oldest events are dropped.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

const CREDENTIAL_PREFIX: &str = "sk-";
const CREDENTIAL_MIN_LEN: usize = 21;

#[derive(Clone)]
pub struct InvokeSettings {
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub api_version: String,
    pub api_key: Option<String>,
    pub cli_program: String,
    pub cli_args: Vec<String>,
    pub connect_timeout: Duration,
    /// Budget for each backend attempt.
    pub timeout: Duration,
}

impl Default for InvokeSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            api_version: "2023-06-01".to_string(),
            api_key: None,
            cli_program: "claude".to_string(),
            cli_args: vec!["--print".to_string()],
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(120),
        }
    }
}

impl fmt::Debug for InvokeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokeSettings")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("api_version", &self.api_version)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("cli_program", &self.cli_program)
            .field("cli_args", &self.cli_args)
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl InvokeSettings {
    /// Settings for one request. A non-blank request credential replaces the
    /// configured one.
    pub fn for_request(&self, request_key: Option<&str>) -> InvokeSettings {
        let mut settings = self.clone();
        if let Some(key) = request_key.filter(|key| !key.trim().is_empty()) {
            settings.api_key = Some(key.to_string());
        }
        settings
    }
}

/// The credential, trimmed, when it looks like an API key.
pub fn usable_credential(raw: Option<&str>) -> Option<&str> {
    let key = raw?.trim();
    (key.starts_with(CREDENTIAL_PREFIX) && key.chars().count() >= CREDENTIAL_MIN_LEN).then_some(key)
}

pub trait ProgressSink: Send + Sync {
    /// Must not block.
    fn emit(&self, update: ProgressUpdate);
}

/// Bounded, non-blocking sink over a tokio broadcast ring. A full ring
/// overwrites its oldest event, so the latest stage always gets through.
pub struct ChannelProgressSink {
    tx: broadcast::Sender<ProgressUpdate>,
}

/// Receiving half of [`ChannelProgressSink::channel`].
pub struct ProgressReceiver {
    rx: broadcast::Receiver<ProgressUpdate>,
    dropped: u64,
}

impl ChannelProgressSink {
    /// A sink and its receiver, holding [`PROGRESS_CHANNEL_CAPACITY`] events.
    pub fn channel() -> (Self, ProgressReceiver) {
        let (tx, rx) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        (Self { tx }, ProgressReceiver { rx, dropped: 0 })
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, update: ProgressUpdate) {
        // Only fails once the receiver is gone.
        let _ = self.tx.send(update);
    }
}

impl ProgressReceiver {
    /// Next event still buffered, or `None` once the sink is dropped and
    /// the buffer drained.
    pub async fn recv(&mut self) -> Option<ProgressUpdate> {
        loop {
            match self.rx.recv().await {
                Ok(update) => return Some(update),
                Err(RecvError::Lagged(skipped)) => {
                    self.dropped += skipped;
                    bridge_debug!("Progress ring full, {skipped} older event(s) overwritten");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Events overwritten before they could be received.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// One way of turning a prompt into raw model text.
#[async_trait::async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, sink: &dyn ProgressSink)
        -> Result<String, InvokeError>;
}

/// Ordered list of backends; the first non-empty answer wins.
#[derive(Clone, Default)]
pub struct ModelInvoker {
    strategies: Vec<Arc<dyn ModelBackend>>,
}

impl ModelInvoker {
    pub fn new(strategies: Vec<Arc<dyn ModelBackend>>) -> Self {
        Self { strategies }
    }

    /// Direct API first when a usable credential is configured, then the
    /// local CLI.
    pub fn from_settings(settings: &InvokeSettings) -> Self {
        let mut strategies: Vec<Arc<dyn ModelBackend>> = Vec::new();
        if let Some(key) = usable_credential(settings.api_key.as_deref()) {
            match ApiBackend::new(settings, key) {
                Ok(backend) => strategies.push(Arc::new(backend)),
                Err(err) => bridge_warn!("Direct API backend disabled: {err}"),
            }
        }
        strategies.push(Arc::new(CliBackend::from_settings(settings)));
        Self { strategies }
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.strategies
            .iter()
            .map(|backend| backend.name().to_string())
            .collect()
    }

    pub async fn invoke(&self, prompt: &str, sink: &dyn ProgressSink) -> Result<String, InvokeError> {
        let mut last_error = None;
        for backend in &self.strategies {
            let name = backend.name();
            bridge_debug!("Invoking model via {name}");
            match backend.complete(prompt, sink).await {
                Ok(text) if !text.trim().is_empty() => {
                    bridge_info!("Model answered via {name} ({} chars)", text.chars().count());
                    sink.emit(
                        ProgressUpdate::new(ProgressStage::Processing, "Processing response")
                            .with_chars(text.chars().count() as u64),
                    );
                    return Ok(text);
                }
                Ok(_) => {
                    bridge_warn!("Backend {name} returned an empty response");
                    last_error = Some(InvokeError::unavailable(format!(
                        "{name} returned an empty response"
                    )));
                }
                Err(err) => {
                    bridge_warn!("Backend {name} failed: {err}");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| InvokeError::unavailable("no model backend configured")))
    }
}

/// Builds the invoker for one request.
pub trait InvokerFactory: Send + Sync {
    fn invoker_for(&self, request_key: Option<&str>) -> ModelInvoker;
}

impl InvokerFactory for InvokeSettings {
    fn invoker_for(&self, request_key: Option<&str>) -> ModelInvoker {
        ModelInvoker::from_settings(&self.for_request(request_key))
    }
}

impl InvokerFactory for ModelInvoker {
    fn invoker_for(&self, _request_key: Option<&str>) -> ModelInvoker {
        self.clone()
    }
}

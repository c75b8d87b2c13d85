use std::time::Duration;

use bridge_core::{ProgressStage, ProgressUpdate};
use bridge_logging::bridge_debug;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::invoke::{InvokeSettings, ModelBackend, ProgressSink};
use crate::{FailureKind, InvokeError};

const ERROR_EXCERPT_CHARS: usize = 200;

/// Anthropic Messages API over HTTPS.
#[derive(Clone)]
pub struct ApiBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_version: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ApiBackend {
    pub fn new(settings: &InvokeSettings, api_key: &str) -> Result<Self, InvokeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InvokeError::unavailable(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", settings.api_url.trim_end_matches('/')),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            api_version: settings.api_version.clone(),
            api_key: api_key.to_string(),
            timeout: settings.timeout,
        })
    }

    fn map_reqwest_error(&self, err: reqwest::Error) -> InvokeError {
        if err.is_timeout() {
            return InvokeError::new(
                FailureKind::Timeout {
                    after: self.timeout,
                },
                "no answer from the API in time",
            );
        }
        InvokeError::unavailable(format!("API request failed: {err}"))
    }
}

#[async_trait::async_trait]
impl ModelBackend for ApiBackend {
    fn name(&self) -> &str {
        "api"
    }

    async fn complete(
        &self,
        prompt: &str,
        sink: &dyn ProgressSink,
    ) -> Result<String, InvokeError> {
        let body = serde_json::to_vec(&MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        })
        .map_err(|err| InvokeError::new(FailureKind::Io, err.to_string()))?;

        sink.emit(ProgressUpdate::new(
            ProgressStage::Sending,
            "Sending request to the model API",
        ));
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| self.map_reqwest_error(err))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.trim().chars().take(ERROR_EXCERPT_CHARS).collect();
            return Err(InvokeError::unavailable(format!("API returned {status}: {excerpt}")));
        }

        sink.emit(ProgressUpdate::new(
            ProgressStage::Waiting,
            "Waiting for the model",
        ));
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| self.map_reqwest_error(err))?;
            bytes.extend_from_slice(&chunk);
            sink.emit(
                ProgressUpdate::new(ProgressStage::Streaming, "Receiving response")
                    .with_chars(bytes.len() as u64),
            );
        }
        bridge_debug!("API response body: {} bytes", bytes.len());

        let parsed: MessagesResponse = serde_json::from_slice(&bytes)
            .map_err(|err| InvokeError::unavailable(format!("malformed API response: {err}")))?;
        Ok(parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

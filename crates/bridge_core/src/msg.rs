use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A decoded UI request. Everything besides `action` and `requestId` is the
/// action-specific payload, kept untyped until a handler claims it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub action: String,
    #[serde(default)]
    pub request_id: Option<Value>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Request {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Deserialize the payload into an action-specific type.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.payload.clone()))
    }
}

/// Best-effort recovery of `requestId` from a body that failed to decode as a
/// [`Request`].
pub fn recover_request_id(body: &[u8]) -> Option<Value> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value.get("requestId").filter(|id| !id.is_null()).cloned()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Response {
    pub fn success(request_id: Option<Value>, fields: Map<String, Value>) -> Self {
        Self {
            request_id,
            success: true,
            error: None,
            fields,
        }
    }

    pub fn failure(request_id: Option<Value>, error: impl Into<String>) -> Self {
        Self {
            request_id,
            success: false,
            error: Some(error.into()),
            fields: Map::new(),
        }
    }
}

/// Pipeline stages reported to the UI while a request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    Preparing,
    Sending,
    Starting,
    Waiting,
    Streaming,
    Processing,
    Parsing,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub stage: ProgressStage,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chars: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
}

impl ProgressUpdate {
    pub fn new(stage: ProgressStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            chars: None,
            input_tokens: None,
        }
    }

    pub fn with_chars(mut self, chars: u64) -> Self {
        self.chars = Some(chars);
        self
    }

    pub fn with_input_tokens(mut self, input_tokens: u64) -> Self {
        self.input_tokens = Some(input_tokens);
        self
    }
}

/// Unsolicited progress notification, correlated by `requestId`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub request_id: Option<Value>,
    pub progress: ProgressUpdate,
}

impl ProgressMessage {
    pub fn new(request_id: Option<Value>, progress: ProgressUpdate) -> Self {
        Self {
            kind: "progress",
            request_id,
            progress,
        }
    }
}

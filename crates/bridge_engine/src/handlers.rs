//! The bridge actions: prompt, invoke, parse, respond.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_core::{
    build_follow_up_prompt, build_prompt, estimate_tokens, parse_follow_up, parse_response,
    ContentKind, ExtractedContent, FollowUpInput, OutputTemplate, ProgressStage, ProgressUpdate,
    PromptInput, Request,
};
use bridge_logging::{bridge_info, describe_text};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::invoke::{InvokerFactory, ProgressSink};
use crate::router::{ActionHandler, Router};
use crate::BridgeError;

pub const ACTION_PING: &str = "ping";
pub const ACTION_SUMMARIZE: &str = "summarize";
pub const ACTION_FOLLOW_UP: &str = "followUp";

/// Router serving every bridge action, invoking models through `invokers`.
pub fn bridge_router(invokers: Arc<dyn InvokerFactory>) -> Router {
    let mut router = Router::new();
    router.register(
        ACTION_SUMMARIZE,
        SummarizeHandler {
            invokers: invokers.clone(),
        },
    );
    router.register(
        ACTION_FOLLOW_UP,
        FollowUpHandler {
            invokers: invokers.clone(),
        },
    );
    let mut actions = router.actions();
    actions.push(ACTION_PING.to_string());
    actions.sort();
    router.register(ACTION_PING, PingHandler { invokers, actions });
    router
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummarizeRequest {
    #[serde(flatten)]
    content: ExtractedContent,
    #[serde(default)]
    content_type: ContentKind,
    #[serde(default)]
    custom_instructions: Option<String>,
    #[serde(default)]
    template: Option<OutputTemplate>,
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowUpRequest {
    #[serde(default)]
    query: String,
    #[serde(flatten)]
    content: ExtractedContent,
    #[serde(default)]
    content_type: ContentKind,
    #[serde(default)]
    existing_learnings: Vec<String>,
    #[serde(default)]
    custom_instructions: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
}

struct PingHandler {
    invokers: Arc<dyn InvokerFactory>,
    actions: Vec<String>,
}

#[async_trait]
impl ActionHandler for PingHandler {
    async fn handle(
        &self,
        _request: &Request,
        _sink: &dyn ProgressSink,
    ) -> Result<Map<String, Value>, BridgeError> {
        let mut fields = Map::new();
        fields.insert(
            "version".to_string(),
            Value::from(env!("CARGO_PKG_VERSION")),
        );
        fields.insert(
            "backends".to_string(),
            Value::from(self.invokers.invoker_for(None).backend_names()),
        );
        fields.insert("actions".to_string(), Value::from(self.actions.clone()));
        Ok(fields)
    }
}

struct SummarizeHandler {
    invokers: Arc<dyn InvokerFactory>,
}

#[async_trait]
impl ActionHandler for SummarizeHandler {
    async fn handle(
        &self,
        request: &Request,
        sink: &dyn ProgressSink,
    ) -> Result<Map<String, Value>, BridgeError> {
        let payload: SummarizeRequest = request.payload_as()?;
        if payload.content.transcript.trim().is_empty() {
            return Err(BridgeError::InvalidRequest(
                "no content to summarize".to_string(),
            ));
        }

        let input = PromptInput {
            content: &payload.content,
            references: &payload.content.links,
            kind: payload.content_type,
            custom_instructions: payload.custom_instructions.as_deref(),
            template: payload.template.as_ref(),
        };
        let prompt = build_prompt(&input);
        bridge_info!(
            "Summarizing {:?} content: prompt {}",
            payload.content_type,
            describe_text(&prompt)
        );
        emit_prepared(sink, &prompt);

        let raw = self
            .invokers
            .invoker_for(payload.api_key.as_deref())
            .invoke(&prompt, sink)
            .await?;

        sink.emit(ProgressUpdate::new(
            ProgressStage::Parsing,
            "Parsing model response",
        ));
        let parsed = parse_response(&raw, &payload.content.links, payload.template.as_ref());
        sink.emit(ProgressUpdate::new(ProgressStage::Complete, "Done"));
        into_fields(&parsed)
    }
}

struct FollowUpHandler {
    invokers: Arc<dyn InvokerFactory>,
}

#[async_trait]
impl ActionHandler for FollowUpHandler {
    async fn handle(
        &self,
        request: &Request,
        sink: &dyn ProgressSink,
    ) -> Result<Map<String, Value>, BridgeError> {
        let payload: FollowUpRequest = request.payload_as()?;
        if payload.query.trim().is_empty() {
            return Err(BridgeError::InvalidRequest("query is required".to_string()));
        }

        let prompt = build_follow_up_prompt(&FollowUpInput {
            query: &payload.query,
            content: &payload.content,
            kind: payload.content_type,
            existing_learnings: &payload.existing_learnings,
            custom_instructions: payload.custom_instructions.as_deref(),
        });
        bridge_info!("Follow-up query: prompt {}", describe_text(&prompt));
        emit_prepared(sink, &prompt);

        let raw = self
            .invokers
            .invoker_for(payload.api_key.as_deref())
            .invoke(&prompt, sink)
            .await?;

        sink.emit(ProgressUpdate::new(
            ProgressStage::Parsing,
            "Classifying answer",
        ));
        let result = parse_follow_up(&raw);
        sink.emit(ProgressUpdate::new(ProgressStage::Complete, "Done"));
        into_fields(&result)
    }
}

fn emit_prepared(sink: &dyn ProgressSink, prompt: &str) {
    sink.emit(
        ProgressUpdate::new(ProgressStage::Preparing, "Prompt ready")
            .with_chars(prompt.chars().count() as u64)
            .with_input_tokens(estimate_tokens(prompt)),
    );
}

fn into_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, BridgeError> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => {
            let mut fields = Map::new();
            fields.insert("result".to_string(), other);
            Ok(fields)
        }
    }
}

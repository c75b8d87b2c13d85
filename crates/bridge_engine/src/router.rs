//! Action registry and per-request dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bridge_core::{recover_request_id, Request, Response};
use bridge_logging::{bridge_debug, bridge_warn};
use serde_json::{Map, Value};

use crate::invoke::ProgressSink;
use crate::BridgeError;

/// Implemented by every action the host serves.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Fields merged into a successful response.
    async fn handle(
        &self,
        request: &Request,
        sink: &dyn ProgressSink,
    ) -> Result<Map<String, Value>, BridgeError>;
}

#[derive(Default)]
pub struct Router {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: &str, handler: impl ActionHandler + 'static) {
        let _ = self.handlers.insert(action.to_owned(), Arc::new(handler));
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Decode a frame body. A body that is not a request becomes a failure
    /// response carrying whatever `requestId` could be recovered.
    pub fn decode(body: &[u8]) -> Result<Request, Response> {
        Request::from_slice(body).map_err(|err| {
            bridge_warn!("Malformed request ({} bytes): {err}", body.len());
            Response::failure(
                recover_request_id(body),
                BridgeError::InvalidRequest(err.to_string()).to_string(),
            )
        })
    }

    pub async fn dispatch(&self, request: &Request, sink: &dyn ProgressSink) -> Response {
        let request_id = request.request_id.clone();
        let Some(handler) = self.handlers.get(&request.action) else {
            bridge_warn!("Unknown action {:?}", request.action);
            return Response::failure(
                request_id,
                BridgeError::UnknownAction(request.action.clone()).to_string(),
            );
        };

        bridge_debug!("Dispatching {} (requestId {:?})", request.action, request_id);
        match handler.handle(request, sink).await {
            Ok(fields) => Response::success(request_id, fields),
            Err(err) => {
                bridge_warn!("{} failed: {err}", request.action);
                Response::failure(request_id, err.to_string())
            }
        }
    }

    /// Decode and dispatch in one step.
    pub async fn dispatch_frame(&self, body: &[u8], sink: &dyn ProgressSink) -> Response {
        match Self::decode(body) {
            Ok(request) => self.dispatch(&request, sink).await,
            Err(response) => response,
        }
    }
}

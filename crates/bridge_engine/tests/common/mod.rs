#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use bridge_core::{ProgressStage, ProgressUpdate};
use bridge_engine::{InvokeError, ModelBackend, ProgressSink};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(bridge_logging::initialize_for_tests);
}

#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> Vec<ProgressStage> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|update| update.stage)
            .collect()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

/// Backend returning a canned answer and counting its calls.
pub struct ScriptedBackend {
    name: &'static str,
    answer: Result<String, InvokeError>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn answering(name: &'static str, text: &str) -> Self {
        Self {
            name,
            answer: Ok(text.to_string()),
            calls: Arc::default(),
        }
    }

    pub fn failing(name: &'static str, error: InvokeError) -> Self {
        Self {
            name,
            answer: Err(error),
            calls: Arc::default(),
        }
    }

    /// Prompts this backend has been called with.
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(
        &self,
        prompt: &str,
        sink: &dyn ProgressSink,
    ) -> Result<String, InvokeError> {
        self.calls.lock().unwrap().push(prompt.to_string());
        sink.emit(ProgressUpdate::new(ProgressStage::Sending, self.name));
        self.answer.clone()
    }
}

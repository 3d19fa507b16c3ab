//! Scripted backend for orchestrator tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::stream;

use crate::model::{
    Backend, EventStream, Message, ModelError, ModelEvent, ModelRequest,
};

/// What the orchestrator asked for in one completion request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
    pub temperature: Option<f32>,
}

/// Replays one scripted response per request and records every request.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Vec<ModelEvent>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedBackend {
    pub fn new(responses: impl IntoIterator<Item = Vec<ModelEvent>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Backend for ScriptedBackend {
    async fn stream(&self, request: ModelRequest<'_>) -> Result<EventStream, ModelError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: request.messages.to_vec(),
            tools: request.tools.iter().map(|t| t.name.clone()).collect(),
            temperature: request.temperature,
        });
        let events = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ModelError::Api("no scripted response left".into()))?;
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

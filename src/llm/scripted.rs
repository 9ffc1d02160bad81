//! Deterministic model that replays queued responses

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatModel, ChatRequest, ChatResponse, ProviderError};

/// Replays queued responses in order and records every request it sees.
/// Runs out with a `MalformedResponse` error.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<ChatResponse, ProviderError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: impl IntoIterator<Item = ChatResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, response: ChatResponse) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(response));
    }

    pub fn push_error(&self, error: ProviderError) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::malformed("scripted model has no responses left")))
    }
}

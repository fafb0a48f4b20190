//! Test doubles shared by the session and router tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm_client::{Completion, CompletionRequest, CompletionService, LlmError};

/// Completion service that replays scripted replies and records every request.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.push(Ok(text.to_string()));
        self
    }

    pub fn fail(self, status: u16, message: &str) -> Self {
        self.push(Err(LlmError::Api {
            status,
            message: message.to_string(),
        }));
        self
    }

    fn push(&self, reply: Result<String, LlmError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent));
        reply.map(|text| Completion { text, usage: None })
    }
}

/// Completion service whose calls never resolve, for exercising cancellation.
pub struct StalledCompletion;

#[async_trait]
impl CompletionService for StalledCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, LlmError> {
        std::future::pending().await
    }
}

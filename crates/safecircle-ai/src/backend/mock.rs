//! Scripted backend for tests and offline runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::traits::{GenerateRequest, GenerateResponse, GenerativeBackend};
use crate::error::{GatewayError, Result};

/// Mock backend for testing.
///
/// Replies are served from a queue; once the queue is empty the fallback
/// reply is returned. Every request is recorded for inspection.
#[derive(Debug)]
pub struct MockBackend {
    model_id: String,
    queue: Mutex<VecDeque<Result<GenerateResponse>>>,
    fallback: GenerateResponse,
    requests: Mutex<Vec<GenerateRequest>>,
    call_count: AtomicU32,
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            queue: Mutex::new(VecDeque::new()),
            fallback: GenerateResponse::from_text("Mock response"),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Set the reply used when the queue is empty.
    #[must_use]
    pub fn with_response(mut self, response: GenerateResponse) -> Self {
        self.fallback = response;
        self
    }

    /// Set a text reply used when the queue is empty.
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_response(GenerateResponse::from_text(text))
    }

    /// Queue a reply for the next call.
    #[must_use]
    pub fn then(self, reply: Result<GenerateResponse>) -> Self {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(reply);
        self
    }

    /// Queue a failure for the next call.
    #[must_use]
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.then(Err(GatewayError::Network(message.into())))
    }

    /// Get the number of times `generate` was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl GenerativeBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request);

        let queued = self
            .queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        queued.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

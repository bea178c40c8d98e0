//! Safety chat.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::{GenerateRequest, Turn};
use crate::error::{GatewayError, Result};
use crate::gateway::AdvisoryGateway;

/// Reply used when the model produces no usable text.
pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't come up with a response.";

/// System instruction for the safety assistant.
pub const SAFETY_CHAT_SYSTEM_PROMPT: &str = "\
You are a friendly and empathetic AI safety assistant for a university campus called SafeCircle.
Your goal is to provide helpful, concise, and actionable safety advice to students.
When a user describes a situation, remain calm and provide clear, step-by-step guidance.
If a situation sounds like an immediate emergency, your first priority is to advise them to use the SOS button in the app or call campus security or the police immediately.
Keep your responses focused on personal safety and relevant to a campus environment. Do not go off-topic.";

/// Input to [`AdvisoryGateway::safety_chat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyChatRequest {
    /// The user's latest question or message.
    pub question: String,
    /// Prior turns, oldest first.
    pub history: Vec<Turn>,
}

impl SafetyChatRequest {
    /// A question with no prior history.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            history: Vec::new(),
        }
    }

    /// Attach prior turns.
    #[must_use]
    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }
}

impl AdvisoryGateway {
    /// Answer a safety question given the caller-supplied history.
    ///
    /// Blank model output is replaced with [`FALLBACK_REPLY`].
    ///
    /// # Errors
    ///
    /// Returns an error if the question is blank or the backend call fails.
    pub async fn safety_chat(&self, request: &SafetyChatRequest) -> Result<String> {
        if request.question.trim().is_empty() {
            return Err(GatewayError::invalid_request("question must not be empty"));
        }

        let generate = GenerateRequest::text(request.question.clone())
            .with_system(SAFETY_CHAT_SYSTEM_PROMPT)
            .with_history(request.history.clone());

        debug!(history = request.history.len(), "Requesting safety chat reply");
        let response = self.backend.generate(generate).await?;

        match response.text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => {
                info!("Model returned no text, using fallback reply");
                Ok(FALLBACK_REPLY.to_string())
            }
        }
    }
}

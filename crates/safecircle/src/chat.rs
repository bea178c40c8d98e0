//! In-memory safety chat session.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use safecircle_ai::{AdvisoryGateway, SafetyChatRequest, Turn};

/// First message of every session.
pub const GREETING: &str = "Hello! I'm your personal safety assistant. Ask me anything about \
staying safe on campus, or describe a situation for advice. How can I help you today?";

/// Shown in place of a reply when the gateway fails.
pub const CONNECTION_ERROR_REPLY: &str =
    "Sorry, I'm having trouble connecting right now. Please try again later.";

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The person using the app.
    User,
    /// The assistant.
    Bot,
}

/// One line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub sender: Sender,
    /// Content.
    pub text: String,
}

impl ChatMessage {
    fn to_turn(&self) -> Turn {
        match self.sender {
            Sender::User => Turn::user(&self.text),
            Sender::Bot => Turn::model(&self.text),
        }
    }
}

/// An ordered, append-only conversation held for the session.
#[derive(Debug, Clone)]
pub struct ChatSession {
    gateway: AdvisoryGateway,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Start a session with the greeting.
    #[must_use]
    pub fn new(gateway: AdvisoryGateway) -> Self {
        Self {
            gateway,
            messages: vec![ChatMessage {
                sender: Sender::Bot,
                text: GREETING.to_string(),
            }],
        }
    }

    /// All messages so far.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Send `input` and append the reply.
    ///
    /// Blank input is ignored and returns `None`. Gateway failures are logged
    /// and answered with [`CONNECTION_ERROR_REPLY`].
    pub async fn send(&mut self, input: &str) -> Option<&ChatMessage> {
        let question = input.trim();
        if question.is_empty() {
            return None;
        }

        let history: Vec<Turn> = self.messages.iter().map(ChatMessage::to_turn).collect();
        self.messages.push(ChatMessage {
            sender: Sender::User,
            text: question.to_string(),
        });

        let request = SafetyChatRequest::new(question).with_history(history);
        let text = match self.gateway.safety_chat(&request).await {
            Ok(reply) => {
                debug!(chars = reply.len(), "Safety chat replied");
                reply
            }
            Err(e) => {
                error!(error = %e, "Safety chat failed");
                CONNECTION_ERROR_REPLY.to_string()
            }
        };

        self.messages.push(ChatMessage {
            sender: Sender::Bot,
            text,
        });
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use safecircle_ai::{MockBackend, Role};

    use super::*;

    #[tokio::test]
    async fn test_starts_with_greeting() {
        let session = ChatSession::new(AdvisoryGateway::new(Arc::new(MockBackend::new("m"))));
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].sender, Sender::Bot);
        assert!(session.messages()[0].text.starts_with("Hello!"));
    }

    #[tokio::test]
    async fn test_send_passes_prior_history() {
        let backend = Arc::new(MockBackend::new("m").with_text("Walk with a friend."));
        let mut session = ChatSession::new(AdvisoryGateway::new(backend.clone()));

        let reply = session.send("  Is it safe at night? ").await.unwrap();
        assert_eq!(reply.text, "Walk with a friend.");
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.messages()[1].text, "Is it safe at night?");

        let requests = backend.requests();
        let request = &requests[0];
        assert_eq!(request.prompt, "Is it safe at night?");
        assert_eq!(request.history.len(), 1);
        assert_eq!(request.history[0].role, Role::Model);

        session.send("Thanks").await.unwrap();
        let requests = backend.requests();
        let history = &requests[1].history;
        let roles: Vec<Role> = history.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Model, Role::User, Role::Model]);
    }

    #[tokio::test]
    async fn test_blank_input_ignored() {
        let backend = Arc::new(MockBackend::new("m"));
        let mut session = ChatSession::new(AdvisoryGateway::new(backend.clone()));

        assert!(session.send("   ").await.is_none());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_appends_apology() {
        let backend = Arc::new(MockBackend::new("m").then_fail("connection refused"));
        let mut session = ChatSession::new(AdvisoryGateway::new(backend));

        let reply = session.send("Help").await.unwrap();
        assert_eq!(reply.sender, Sender::Bot);
        assert_eq!(reply.text, CONNECTION_ERROR_REPLY);
    }
}

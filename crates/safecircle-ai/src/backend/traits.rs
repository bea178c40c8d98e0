//! Core traits for generative backends.
//!
//! This module defines the `GenerativeBackend` trait - the single seam between
//! the advisory gateway and whichever model service answers its requests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Core trait for generative backends.
///
/// One call is one round trip. Implementations must not retry or cache.
#[async_trait]
pub trait GenerativeBackend: Send + Sync + std::fmt::Debug {
    /// Get the backend identifier (e.g., model name).
    fn id(&self) -> &str;

    /// Run a single generation request.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;
}

/// A generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// System instruction (optional).
    pub system: Option<String>,
    /// Prior conversation, oldest first.
    pub history: Vec<Turn>,
    /// The prompt for this call.
    pub prompt: String,
    /// What kind of output is requested.
    pub output: OutputMode,
}

impl GenerateRequest {
    /// Create a plain text request for the given prompt.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            history: Vec::new(),
            prompt: prompt.into(),
            output: OutputMode::Text,
        }
    }

    /// Add a system instruction.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Replace the conversation history.
    #[must_use]
    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    /// Request JSON output conforming to `schema`.
    #[must_use]
    pub fn with_json_schema(mut self, schema: serde_json::Value) -> Self {
        self.output = OutputMode::Json { schema };
        self
    }

    /// Request spoken audio in the given voice.
    #[must_use]
    pub fn with_audio(mut self, voice: impl Into<String>) -> Self {
        self.output = OutputMode::Audio {
            voice: voice.into(),
        };
        self
    }
}

/// Requested output modality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum OutputMode {
    /// Free text.
    Text,
    /// JSON matching a schema.
    Json {
        /// Response schema in the provider's schema dialect.
        schema: serde_json::Value,
    },
    /// Synthesized speech.
    Audio {
        /// Prebuilt voice name.
        voice: String,
    },
}

/// One prior turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn.
    pub role: Role,
    /// Text of the turn.
    pub text: String,
}

impl Turn {
    /// A turn written by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// A turn written by the model.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The assistant.
    Model,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Model => write!(f, "model"),
        }
    }
}

/// Response from a generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
    /// Concatenated text parts, if any.
    pub text: Option<String>,
    /// Inline media, if any.
    pub media: Option<Media>,
}

impl GenerateResponse {
    /// A response carrying only text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            media: None,
        }
    }

    /// A response carrying only media.
    #[must_use]
    pub fn from_media(media: Media) -> Self {
        Self {
            text: None,
            media: Some(media),
        }
    }
}

/// Raw inline media returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    /// MIME type as reported by the backend (e.g. `audio/L16;codec=pcm;rate=24000`).
    pub mime_type: String,
    /// Decoded bytes.
    pub data: Vec<u8>,
}

impl Media {
    /// Read a numeric `rate=` parameter from the MIME type, if present.
    #[must_use]
    pub fn sample_rate(&self) -> Option<u32> {
        self.mime_type
            .split(';')
            .filter_map(|param| param.trim().strip_prefix("rate="))
            .find_map(|value| value.trim().parse().ok())
    }
}

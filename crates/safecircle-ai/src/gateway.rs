//! The advisory gateway.
//!
//! A thin, stateless front over a [`GenerativeBackend`]. The three operations
//! live next to their request/response types in [`crate::chat`],
//! [`crate::insights`] and [`crate::speech`].

use std::sync::Arc;

use crate::backend::GenerativeBackend;

/// Default prebuilt voice for speech synthesis.
pub const DEFAULT_VOICE: &str = "achernar";

/// Forwards chat, risk and speech requests to a generative backend.
#[derive(Debug, Clone)]
pub struct AdvisoryGateway {
    pub(crate) backend: Arc<dyn GenerativeBackend>,
    pub(crate) voice: String,
}

impl AdvisoryGateway {
    /// Create a gateway over the given backend.
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            backend,
            voice: DEFAULT_VOICE.to_string(),
        }
    }

    /// Use a different prebuilt voice for speech.
    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Identifier of the backing model.
    #[must_use]
    pub fn backend_id(&self) -> &str {
        self.backend.id()
    }

    /// The configured voice.
    #[must_use]
    pub fn voice(&self) -> &str {
        &self.voice
    }
}

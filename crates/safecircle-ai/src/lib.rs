//! `safecircle-ai` - AI advisory gateway for safecircle
//!
//! Stateless request/response wrappers around an external generative model:
//! conversational safety chat, structured route risk assessment and
//! text-to-speech. Each call is a single round trip; there is no retry,
//! caching or rate limiting.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod backend;
pub mod chat;
pub mod error;
pub mod gateway;
pub mod insights;
pub mod speech;

pub use backend::{GeminiBackend, GeminiConfig, GenerativeBackend, MockBackend, Role, Turn};
pub use chat::{SafetyChatRequest, FALLBACK_REPLY};
pub use error::{GatewayError, Result};
pub use gateway::{AdvisoryGateway, DEFAULT_VOICE};
pub use insights::{RiskAssessment, RiskLevel, RouteRiskRequest};
pub use speech::SpeechAudio;

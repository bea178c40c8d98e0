//! Generative backend abstraction layer.
//!
//! - Gemini (Generative Language REST API)
//! - Mock backend for testing

pub mod gemini;
pub mod mock;
pub mod traits;

pub use gemini::{GeminiBackend, GeminiConfig};
pub use mock::MockBackend;
pub use traits::{
    GenerateRequest, GenerateResponse, GenerativeBackend, Media, OutputMode, Role, Turn,
};

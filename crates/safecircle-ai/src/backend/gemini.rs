//! Gemini backend over the Generative Language REST API.
//!
//! Sends `POST {base_url}/models/{model}:generateContent` with the API key in
//! the `x-goog-api-key` header. Speech requests are routed to a separate
//! speech-capable model.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::traits::{GenerateRequest, GenerateResponse, GenerativeBackend, Media, OutputMode, Role};
use crate::error::{GatewayError, Result};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default text model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default speech model.
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Longest error body kept in [`GatewayError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Settings for [`GeminiBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// API key.
    pub api_key: String,
    /// Model used for text and JSON output.
    pub model: String,
    /// Model used for audio output.
    pub speech_model: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl GeminiConfig {
    /// Settings with default endpoints and models for the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Point the backend at another API root (used by tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Backend speaking the Gemini `generateContent` protocol.
#[derive(Debug)]
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    /// Create a new backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is blank or the HTTP client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GatewayError::NotConfigured(
                "an API key is required for the Gemini backend".to_string(),
            ));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .user_agent(concat!("safecircle/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    /// Build the request URL for a model.
    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    fn build_body(request: &GenerateRequest) -> GenerateContentRequest {
        let system_instruction = request.system.as_ref().map(|text| Content {
            role: None,
            parts: vec![Part::text(text)],
        });

        let mut contents: Vec<Content> = request
            .history
            .iter()
            .map(|turn| Content {
                role: Some(
                    match turn.role {
                        Role::User => "user",
                        Role::Model => "model",
                    }
                    .to_string(),
                ),
                parts: vec![Part::text(&turn.text)],
            })
            .collect();
        contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![Part::text(&request.prompt)],
        });

        let generation_config = match &request.output {
            OutputMode::Text => None,
            OutputMode::Json { schema } => Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(schema.clone()),
                ..GenerationConfig::default()
            }),
            OutputMode::Audio { voice } => Some(GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.clone(),
                        },
                    },
                }),
                ..GenerationConfig::default()
            }),
        };

        GenerateContentRequest {
            system_instruction,
            contents,
            generation_config,
        }
    }

    fn parse_response(response: GenerateContentResponse) -> Result<GenerateResponse> {
        let Some(candidate) = response.candidates.into_iter().next() else {
            return Err(GatewayError::malformed("response contained no candidates"));
        };

        let mut text: Option<String> = None;
        let mut media: Option<Media> = None;

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(fragment) = part.text {
                text.get_or_insert_with(String::new).push_str(&fragment);
            }
            if let Some(inline) = part.inline_data {
                if media.is_some() {
                    warn!("Ignoring additional inline media part");
                    continue;
                }
                let data = general_purpose::STANDARD
                    .decode(inline.data.as_bytes())
                    .map_err(|e| GatewayError::malformed(format!("inline data: {e}")))?;
                media = Some(Media {
                    mime_type: inline.mime_type,
                    data,
                });
            }
        }

        Ok(GenerateResponse { text, media })
    }
}

/// `generateContent` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

/// `generateContent` response body.
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    fn id(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let model = match request.output {
            OutputMode::Audio { .. } => &self.config.speech_model,
            _ => &self.config.model,
        };
        let url = self.generate_url(model);
        let body = Self::build_body(&request);

        debug!(model = %model, turns = body.contents.len(), "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            warn!(status = %status, "generateContent request failed");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::malformed(e.to_string()))?;

        Self::parse_response(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::traits::Turn;

    #[test]
    fn test_new_requires_api_key() {
        let err = GeminiBackend::new(GeminiConfig::new("  ")).unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured(_)));
    }

    #[test]
    fn test_generate_url() {
        let backend =
            GeminiBackend::new(GeminiConfig::new("key").with_base_url("http://localhost:9/v1/"))
                .unwrap();
        assert_eq!(
            backend.generate_url("m"),
            "http://localhost:9/v1/models/m:generateContent"
        );
    }

    #[test]
    fn test_build_body_text_with_history() {
        let request = GenerateRequest::text("now?")
            .with_system("sys")
            .with_history(vec![Turn::model("hello"), Turn::user("hi")]);
        let body = serde_json::to_value(GeminiBackend::build_body(&request)).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["contents"][0]["role"], "model");
        assert_eq!(body["contents"][1]["role"], "user");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "now?");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_build_body_json_and_audio() {
        let json = GenerateRequest::text("x").with_json_schema(serde_json::json!({"type": "OBJECT"}));
        let body = serde_json::to_value(GeminiBackend::build_body(&json)).unwrap();
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");

        let audio = GenerateRequest::text("x").with_audio("achernar");
        let body = serde_json::to_value(GeminiBackend::build_body(&audio)).unwrap();
        assert_eq!(body["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "achernar"
        );
    }

    #[test]
    fn test_parse_response_joins_text_parts() {
        let raw: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Stay "}, {"text": "safe"}]}}]
        }))
        .unwrap();
        let response = GeminiBackend::parse_response(raw).unwrap();
        assert_eq!(response.text.as_deref(), Some("Stay safe"));
        assert!(response.media.is_none());
    }

    #[test]
    fn test_parse_response_decodes_inline_data() {
        let raw: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"parts": [{"inlineData": {
                "mimeType": "audio/L16;codec=pcm;rate=24000",
                "data": "AAEC"
            }}]}}]
        }))
        .unwrap();
        let response = GeminiBackend::parse_response(raw).unwrap();
        let media = response.media.unwrap();
        assert_eq!(media.data, vec![0, 1, 2]);
        assert_eq!(media.sample_rate(), Some(24000));
    }

    #[test]
    fn test_parse_response_without_candidates() {
        let raw = GenerateContentResponse { candidates: vec![] };
        assert!(matches!(
            GeminiBackend::parse_response(raw),
            Err(GatewayError::MalformedOutput(_))
        ));
    }
}

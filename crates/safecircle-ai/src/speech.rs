//! Text-to-speech.
//!
//! Speech models return raw little-endian PCM. It is wrapped in a RIFF/WAVE
//! container so ordinary players can handle it, then base64 encoded.

use base64::{engine::general_purpose, Engine as _};
use tracing::debug;

use crate::backend::GenerateRequest;
use crate::error::{GatewayError, Result};
use crate::gateway::AdvisoryGateway;

/// Sample rate assumed when the model does not report one.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Channels in model PCM output.
pub const CHANNELS: u16 = 1;

/// Bits per sample in model PCM output.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Highest sample rate accepted from the model.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Size of the canonical WAV header.
const WAV_HEADER_LEN: usize = 44;

/// Synthesized speech as a base64 WAV payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    /// Base64-encoded WAV file.
    pub wav_base64: String,
    /// Sample rate of the audio.
    pub sample_rate: u32,
}

impl SpeechAudio {
    /// The audio as a `data:` URI.
    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("data:audio/wav;base64,{}", self.wav_base64)
    }

    /// Decode the WAV bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid base64.
    pub fn wav_bytes(&self) -> Result<Vec<u8>> {
        general_purpose::STANDARD
            .decode(self.wav_base64.as_bytes())
            .map_err(|e| GatewayError::Encoding(e.to_string()))
    }
}

/// Wrap raw PCM samples in a WAV container.
///
/// # Errors
///
/// Returns an error if the sample data is too large for a RIFF chunk or the
/// format parameters are zero.
pub fn encode_wav(
    pcm: &[u8],
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<Vec<u8>> {
    if channels == 0 || sample_rate == 0 || bits_per_sample == 0 {
        return Err(GatewayError::Encoding(
            "channels, sample rate and bit depth must be non-zero".to_string(),
        ));
    }

    let data_len = u32::try_from(pcm.len())
        .ok()
        .filter(|len| len.checked_add(36).is_some())
        .ok_or_else(|| GatewayError::Encoding("audio too large for WAV".to_string()))?;

    let block_align = channels * bits_per_sample.div_ceil(8);
    let byte_rate = sample_rate
        .checked_mul(u32::from(block_align))
        .ok_or_else(|| {
            GatewayError::Encoding(format!("sample rate {sample_rate} Hz overflows the byte rate"))
        })?;

    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    Ok(wav)
}

impl AdvisoryGateway {
    /// Synthesize speech for `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is blank, the backend call fails, or the
    /// response carries no audio.
    pub async fn text_to_speech(&self, text: &str) -> Result<SpeechAudio> {
        if text.trim().is_empty() {
            return Err(GatewayError::invalid_request("text must not be empty"));
        }

        let generate = GenerateRequest::text(text).with_audio(self.voice.clone());
        let response = self.backend.generate(generate).await?;

        let media = response.media.ok_or(GatewayError::MissingAudio)?;
        if media.data.is_empty() {
            return Err(GatewayError::MissingAudio);
        }

        let sample_rate = media.sample_rate().unwrap_or(DEFAULT_SAMPLE_RATE);
        if sample_rate == 0 || sample_rate > MAX_SAMPLE_RATE {
            return Err(GatewayError::Encoding(format!(
                "model reported an unusable sample rate: {sample_rate} Hz"
            )));
        }
        debug!(
            bytes = media.data.len(),
            sample_rate,
            mime_type = %media.mime_type,
            "Encoding speech audio"
        );

        let wav = encode_wav(&media.data, CHANNELS, sample_rate, BITS_PER_SAMPLE)?;
        Ok(SpeechAudio {
            wav_base64: general_purpose::STANDARD.encode(wav),
            sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::{GenerateResponse, Media, MockBackend, OutputMode};

    #[test]
    fn test_encode_wav_header() {
        let pcm = [0u8, 1, 2, 3];
        let wav = encode_wav(&pcm, 1, 24_000, 16).unwrap();

        assert_eq!(wav.len(), WAV_HEADER_LEN + 4);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 40);
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        assert_eq!(u16::from_le_bytes(wav[22..24].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 24_000);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 48_000);
        assert_eq!(u16::from_le_bytes(wav[32..34].try_into().unwrap()), 2);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 4);
        assert_eq!(&wav[44..], &pcm);
    }

    #[test]
    fn test_encode_wav_rejects_zero_rate() {
        assert!(encode_wav(&[0, 0], 1, 0, 16).is_err());
    }

    #[tokio::test]
    async fn test_text_to_speech_wraps_pcm() {
        let backend = Arc::new(MockBackend::new("tts").with_response(GenerateResponse::from_media(
            Media {
                mime_type: "audio/L16;codec=pcm;rate=24000".to_string(),
                data: vec![0, 0, 1, 0],
            },
        )));
        let gateway = AdvisoryGateway::new(backend.clone()).with_voice("kore");

        let audio = gateway.text_to_speech("Stay in lit areas").await.unwrap();
        assert_eq!(audio.sample_rate, 24_000);
        assert!(audio.data_uri().starts_with("data:audio/wav;base64,"));

        let wav = audio.wav_bytes().unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[44..], &[0, 0, 1, 0]);

        assert_eq!(
            backend.requests()[0].output,
            OutputMode::Audio {
                voice: "kore".to_string()
            }
        );
    }

    #[test]
    fn test_encode_wav_rejects_overflowing_byte_rate() {
        let err = encode_wav(&[0, 0], 1, 4_000_000_000, 16).unwrap_err();
        assert!(matches!(err, GatewayError::Encoding(_)));
    }

    #[tokio::test]
    async fn test_text_to_speech_rejects_absurd_sample_rate() {
        let backend = Arc::new(MockBackend::new("tts").with_response(GenerateResponse::from_media(
            Media {
                mime_type: "audio/L16;codec=pcm;rate=4000000000".to_string(),
                data: vec![0, 0, 1, 0],
            },
        )));
        let gateway = AdvisoryGateway::new(backend);

        let err = gateway.text_to_speech("hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::Encoding(_)));
        assert!(err.to_string().contains("4000000000"));
    }

    #[tokio::test]
    async fn test_text_to_speech_without_media_is_fatal() {
        let gateway = AdvisoryGateway::new(Arc::new(MockBackend::new("tts").with_text("no audio")));
        let err = gateway.text_to_speech("hello").await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingAudio));
    }

    #[tokio::test]
    async fn test_text_to_speech_rejects_blank_text() {
        let backend = Arc::new(MockBackend::new("tts"));
        let gateway = AdvisoryGateway::new(backend.clone());
        assert!(gateway.text_to_speech(" ").await.is_err());
        assert_eq!(backend.call_count(), 0);
    }
}

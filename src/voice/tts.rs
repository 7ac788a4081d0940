//! Text-to-speech (TTS) processing

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{AudioClip, AudioFormat};
use crate::endpoint::{self, Endpoint};
use crate::{Error, Result};

/// Produces an audio buffer from text
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text`; `language` is a hint and may be empty
    ///
    /// # Errors
    ///
    /// Returns `Error::Tts` on failure or `Error::Cancelled` if `cancel` fires
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<AudioClip>;
}

/// Synthesizes through `POST {base}/audio/speech`
pub struct TextToSpeech {
    endpoint: Arc<Endpoint>,
    model: String,
    voice: String,
}

impl TextToSpeech {
    /// Create a new TTS client
    #[must_use]
    pub const fn new(endpoint: Arc<Endpoint>, model: String, voice: String) -> Self {
        Self {
            endpoint,
            model,
            voice,
        }
    }

    async fn request(&self, text: &str) -> Result<AudioClip> {
        #[derive(serde::Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
        }

        let format = AudioFormat::Wav;
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: format.api_name(),
        };

        let response = self
            .endpoint
            .post("audio/speech")?
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Tts(endpoint::error_message(response).await));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Tts(format!("failed to read audio: {e}")))?;

        Ok(AudioClip {
            data: audio.to_vec(),
            format,
        })
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<AudioClip> {
        // The speech endpoint infers language from the text itself
        tracing::debug!(chars = text.len(), language, model = %self.model, "synthesizing");

        let clip = tokio::select! {
            result = self.request(text) => result?,
            () = cancel.cancelled() => return Err(Error::Cancelled),
        };

        if clip.is_empty() {
            return Err(Error::Tts("empty audio response".to_string()));
        }

        tracing::debug!(bytes = clip.data.len(), duration = ?clip.duration(), "synthesis complete");
        Ok(clip)
    }
}

//! Speech-to-text (STT) processing

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{AudioClip, language_tag};
use crate::endpoint::{self, Endpoint};
use crate::{Error, Result};

/// Transcribed speech
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transcription {
    /// Recognised text, trimmed
    pub text: String,
    /// Primary language tag of the speech, empty if unknown
    pub language: String,
}

/// Converts audio to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a clip
    ///
    /// # Errors
    ///
    /// Returns `Error::Stt` on failure or `Error::Cancelled` if `cancel` fires
    async fn transcribe(
        &self,
        clip: &AudioClip,
        cancel: &CancellationToken,
    ) -> Result<Transcription>;
}

/// Response from an OpenAI-compatible transcription API
///
/// Servers that report the detected language put it next to the text.
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

impl From<TranscriptionResponse> for Transcription {
    fn from(response: TranscriptionResponse) -> Self {
        Self {
            text: response.text.trim().to_string(),
            language: response.language.as_deref().map(language_tag).unwrap_or_default(),
        }
    }
}

/// Transcribes through `POST {base}/audio/transcriptions`
pub struct SpeechToText {
    endpoint: Arc<Endpoint>,
    model: String,
}

impl SpeechToText {
    /// Create a new STT client
    #[must_use]
    pub const fn new(endpoint: Arc<Endpoint>, model: String) -> Self {
        Self { endpoint, model }
    }

    async fn request(&self, clip: &AudioClip) -> Result<Transcription> {
        tracing::debug!(
            audio_bytes = clip.data.len(),
            model = %self.model,
            "starting transcription"
        );

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(clip.data.clone())
                    .file_name(clip.file_name())
                    .mime_str(clip.format.mime())
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .endpoint
            .post("audio/transcriptions")?
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Stt(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Stt(endpoint::error_message(response).await));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("failed to parse response: {e}")))?;

        let transcription = Transcription::from(result);
        tracing::info!(
            transcript = %transcription.text,
            language = %transcription.language,
            "transcription complete"
        );
        Ok(transcription)
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(
        &self,
        clip: &AudioClip,
        cancel: &CancellationToken,
    ) -> Result<Transcription> {
        tokio::select! {
            result = self.request(clip) => result,
            () = cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}

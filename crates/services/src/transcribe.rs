use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use intervue_config::LlmSettings;

#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    #[error("transcription unavailable: {0}")]
    Unavailable(String),
    #[error("transcription timed out")]
    Timeout,
    #[error("audio rejected: {0}")]
    InvalidAudio(String),
}

/// Opaque speech-to-text capability.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        content_type: &str,
    ) -> Result<String, TranscribeError>;
}

/// Whisper-compatible HTTP transcription (Groq's audio endpoint by default).
/// Shares the LLM provider's credentials and timeout bound.
pub struct HttpTranscriber {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl HttpTranscriber {
    pub fn from_settings(settings: &LlmSettings) -> Option<Self> {
        let api_key = settings.api_key.clone()?;
        Some(Self {
            http: reqwest::Client::new(),
            base_url: settings.base_url.clone(),
            api_key,
            timeout: Duration::from_secs(settings.timeout_secs),
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        content_type: &str,
    ) -> Result<String, TranscribeError> {
        if audio.len() < 100 {
            return Err(TranscribeError::InvalidAudio(
                "audio file too small or empty".to_string(),
            ));
        }

        let extension = match content_type {
            ct if ct.contains("webm") => "webm",
            ct if ct.contains("ogg") => "ogg",
            ct if ct.contains("mp3") => "mp3",
            ct if ct.contains("m4a") || ct.contains("mp4") => "m4a",
            _ => "wav",
        };

        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(format!("audio.{extension}"))
            .mime_str(content_type)
            .map_err(|e| TranscribeError::InvalidAudio(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", "whisper-large-v3");

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranscribeError::Timeout
                } else {
                    TranscribeError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranscribeError::Unavailable(format!("status {status}")));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::Unavailable(e.to_string()))?;

        debug!(chars = parsed.text.len(), "Transcript received");
        Ok(parsed.text)
    }
}

/// A transcript is considered usable when it carries at least one word.
/// Short answers ("yes", "no") are deliberately allowed through.
pub fn transcript_is_valid(transcript: &str) -> bool {
    transcript.split_whitespace().next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transcript_is_invalid() {
        assert!(!transcript_is_valid(""));
        assert!(!transcript_is_valid("   \n "));
    }

    #[test]
    fn single_word_transcript_is_valid() {
        assert!(transcript_is_valid("yes"));
    }
}

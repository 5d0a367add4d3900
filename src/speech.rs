//! Speech-to-text adapter.
//!
//! The adapter owns language-to-locale mapping and result flattening;
//! the backend behind [`SpeechBackend`] owns recognition itself. Backend
//! failures carry the backend's message and are not retried here.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SpeechConfig;
use crate::error::{BotError, Result};
use crate::language::Language;

/// Recognizes normalized audio (mono, 16 kHz, linear PCM) into transcript
/// segments, in backend order.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn recognize(&self, audio: Vec<u8>, locale: &str) -> Result<Vec<String>>;
}

/// OpenAI-compatible transcription endpoint client.
pub struct SpeechApiClient {
    client: reqwest::Client,
    config: SpeechConfig,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<TranscriptionSegment>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionSegment {
    text: String,
}

impl SpeechApiClient {
    pub fn new(config: SpeechConfig) -> Self {
        SpeechApiClient {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SpeechBackend for SpeechApiClient {
    async fn recognize(&self, audio: Vec<u8>, locale: &str) -> Result<Vec<String>> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| BotError::Backend {
                service: "speech",
                message: e.to_string(),
            })?;

        let form = reqwest::multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("language", locale.to_string())
            .text("response_format", "verbose_json")
            .part("file", part);

        let url = format!("{}/audio/transcriptions", self.config.base_url);
        debug!("Sending recognition request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| BotError::Backend {
                service: "speech",
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Backend {
                service: "speech",
                message: format!("{}: {}", status, body),
            });
        }

        let parsed: TranscriptionResponse =
            response.json().await.map_err(|e| BotError::Backend {
                service: "speech",
                message: format!("malformed response: {}", e),
            })?;

        if parsed.segments.is_empty() {
            let text = parsed.text.trim();
            if text.is_empty() {
                return Ok(Vec::new());
            }
            return Ok(vec![text.to_string()]);
        }

        Ok(parsed
            .segments
            .into_iter()
            .map(|s| s.text.trim().to_string())
            .collect())
    }
}

/// Transcription adapter over a speech backend.
pub struct Transcriber {
    backend: Arc<dyn SpeechBackend>,
}

impl Transcriber {
    pub fn new(backend: Arc<dyn SpeechBackend>) -> Self {
        Transcriber { backend }
    }

    /// Read the normalized audio and return one transcript string:
    /// recognition segments joined by newlines, in backend order.
    /// Zero segments yield an empty string, not an error.
    pub async fn transcribe(&self, wav_path: &Path, language: Language) -> Result<String> {
        let audio = tokio::fs::read(wav_path).await?;
        let segments = self
            .backend
            .recognize(audio, language.locale_tag())
            .await?;
        Ok(segments.join("\n"))
    }
}

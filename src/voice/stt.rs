//! Speech-to-text via the Whisper transcription API

use crate::{Error, Result};

/// Default transcription endpoint
pub const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes WAV audio to text
#[derive(Debug, Clone)]
pub struct SpeechToText {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    language: String,
}

impl SpeechToText {
    /// Create a Whisper transcriber
    ///
    /// `language` is an ISO-639-1 code; a region suffix such as `en-US` is
    /// reduced to `en`.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new_whisper(api_key: String, model: String, language: &str) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        let language = language
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: WHISPER_URL.to_string(),
            api_key,
            model,
            language,
        })
    }

    /// Point the transcriber at a different API endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Language sent with each request
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Transcribe WAV bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects the audio
    pub async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting Whisper transcription");

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav.to_vec())
                    .file_name("speech.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());
        if !self.language.is_empty() {
            form = form.text("language", self.language.clone());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        let transcript = result.text.trim().to_string();

        tracing::debug!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

//! Remote speech-to-text client

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::language::Language;
use crate::{Error, Result};

/// Response from a Whisper-style transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes WAV audio through a Whisper-style HTTP endpoint
#[derive(Debug, Clone)]
pub struct SttClient {
    client: reqwest::Client,
    url: String,
    model: String,
    token: Option<SecretString>,
}

impl SttClient {
    /// Create a client for `url` using `model`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        url: String,
        model: String,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            model,
            token,
        })
    }

    /// Transcribe WAV audio, hinting the recognizer with `language`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] on connectivity/timeout failures and
    /// [`Error::Service`] on non-success or malformed responses
    pub async fn transcribe(&self, audio: Vec<u8>, language: Language) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), language = %language, "transcribing");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", language.code());

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "STT request failed");
            Error::from_transport(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "STT API error");
            return Err(Error::Service(format!("STT error {status}: {body}")));
        }

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse STT response");
            Error::Service(e.to_string())
        })?;

        tracing::debug!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

//! Remote speech synthesis

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::audio;
use crate::language::Language;
use crate::speech::RemoteSynthesis;
use crate::{Error, Result};

/// Synthesis request body
#[derive(serde::Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    lang: &'a str,
}

/// Fetches synthesized audio from a remote TTS endpoint
///
/// Posts `{text, lang}` and receives an audio byte stream. Timeouts,
/// non-success statuses, and empty payloads are all failures the caller
/// recovers from via local fallback.
#[derive(Debug, Clone)]
pub struct RemoteTtsClient {
    client: reqwest::Client,
    url: String,
    token: Option<SecretString>,
}

impl RemoteTtsClient {
    /// Create a client for `url`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: String, token: Option<SecretString>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, url, token })
    }
}

#[async_trait]
impl RemoteSynthesis for RemoteTtsClient {
    async fn fetch(&self, text: &str, language: Language) -> Result<Vec<u8>> {
        tracing::debug!(chars = text.len(), language = %language, "fetching synthesis");

        let body = TtsRequest {
            text,
            lang: language.code(),
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "TTS request failed");
            Error::from_transport(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "TTS API error");
            return Err(Error::Service(format!("TTS error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::from_transport(&e))?;

        if audio.is_empty() {
            return Err(Error::Service("TTS returned empty payload".to_string()));
        }

        Ok(audio.to_vec())
    }
}

/// Play fetched audio through the default output device
///
/// The bytes are staged in a temp file for the player; the file is removed
/// on every exit path (success, player error, stop) by RAII.
///
/// # Errors
///
/// Returns error if the audio cannot be staged, decoded, or played
pub async fn play_remote_audio(data: Vec<u8>, stop: Arc<AtomicBool>) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&data)?;
        file.flush()?;

        let staged = std::fs::read(file.path())?;
        audio::play_mp3(&staged, &stop)
        // `file` dropped here: the temp audio is deleted whether playback
        // succeeded, failed, or was stopped
    })
    .await
    .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let body = TtsRequest {
            text: "你好",
            lang: "zh",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["text"], "你好");
        assert_eq!(json["lang"], "zh");
    }
}

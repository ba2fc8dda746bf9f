//! Remote text translation

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::language::Language;
use crate::{Error, Result};

/// Translation request body
#[derive(serde::Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    #[serde(rename = "sourceLang")]
    source_lang: &'a str,
    #[serde(rename = "targetLang")]
    target_lang: &'a str,
}

/// Translation response body
#[derive(serde::Deserialize)]
struct TranslateResponse {
    translated: String,
}

/// Translates text between two languages
///
/// Implementations are stateless request/response services; single-flight
/// is the turn controller's responsibility, not the translator's.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `source` to `target`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] on connectivity/timeout failures and
    /// [`Error::Service`] on non-success or malformed responses. No
    /// automatic retry; the caller re-invokes on a subsequent turn.
    async fn translate(&self, text: &str, source: Language, target: Language) -> Result<String>;
}

/// HTTP translation gateway
///
/// Posts `{text, sourceLang, targetLang}` and expects `{translated}`. A
/// bearer token is attached when configured; the endpoint also accepts
/// unauthenticated calls.
#[derive(Debug, Clone)]
pub struct TranslationGateway {
    client: reqwest::Client,
    url: String,
    token: Option<SecretString>,
}

impl TranslationGateway {
    /// Create a gateway for `url`
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
impl Translator for TranslationGateway {
    async fn translate(&self, text: &str, source: Language, target: Language) -> Result<String> {
        tracing::debug!(chars = text.len(), source = %source, target = %target, "translating");

        let body = TranslateRequest {
            text,
            source_lang: source.code(),
            target_lang: target.code(),
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "translate request failed");
            Error::from_transport(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "translate API error");
            return Err(Error::Service(format!("translate error {status}: {body}")));
        }

        let result: TranslateResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse translate response");
            Error::Service(e.to_string())
        })?;

        tracing::info!(source = %source, target = %target, "translation complete");
        Ok(result.translated)
    }
}

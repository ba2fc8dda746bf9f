//! Configuration for a translation session
//!
//! Environment variables take priority over the optional `duotalk.toml`
//! overlay in the platform data directory, which in turn overrides the
//! built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::language::{Language, LanguagePair};
use crate::turn::TurnOptions;
use crate::{Error, Result};

/// Default translation endpoint
const DEFAULT_TRANSLATE_URL: &str = "http://localhost:3000/api/translate";

/// Default remote synthesis endpoint
const DEFAULT_TTS_URL: &str = "http://localhost:3000/api/tts";

/// Default Whisper-style transcription endpoint
const DEFAULT_STT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Default transcription model
const DEFAULT_STT_MODEL: &str = "whisper-1";

/// Default silence debounce in milliseconds
const DEFAULT_SILENCE_TIMEOUT_MS: u64 = 1200;

/// Default per-request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Session configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Translation endpoint URL
    pub translate_url: String,

    /// Remote synthesis endpoint URL; `None` disables the remote strategy
    /// and every turn speaks through local synthesis
    pub tts_url: Option<String>,

    /// Transcription endpoint URL
    pub stt_url: String,

    /// Transcription model identifier
    pub stt_model: String,

    /// Bearer token attached to provider requests when present
    pub token: Option<SecretString>,

    /// The session's language pair
    pub pair: LanguagePair,

    /// Debounce after the last partial before finalization
    pub silence_timeout: Duration,

    /// Timeout for each provider request
    pub request_timeout: Duration,

    /// History retention cap (`None` = unbounded)
    pub history_retention: Option<usize>,

    /// Re-orient the pair from detected utterance language
    pub auto_detect: bool,

    /// Platform data directory
    pub data_dir: PathBuf,
}

/// Optional `duotalk.toml` overlay
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    translate_url: Option<String>,
    tts_url: Option<String>,
    stt_url: Option<String>,
    stt_model: Option<String>,
    source_lang: Option<String>,
    target_lang: Option<String>,
    silence_timeout_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    history_retention: Option<usize>,
    auto_detect: Option<bool>,
}

impl Config {
    /// Load configuration from the environment and the optional overlay
    ///
    /// # Errors
    ///
    /// Returns error if a URL or language tag is invalid
    pub fn load() -> Result<Self> {
        let data_dir = data_dir();
        let overlay = load_overlay(&data_dir);

        let translate_url = env_or("DUOTALK_TRANSLATE_URL", overlay.translate_url.clone())
            .unwrap_or_else(|| DEFAULT_TRANSLATE_URL.to_string());

        // "none" disables remote synthesis entirely
        let tts_url = match env_or("DUOTALK_TTS_URL", overlay.tts_url.clone()) {
            Some(url) if url.is_empty() || url.eq_ignore_ascii_case("none") => None,
            Some(url) => Some(url),
            None => Some(DEFAULT_TTS_URL.to_string()),
        };

        let stt_url = env_or("DUOTALK_STT_URL", overlay.stt_url.clone())
            .unwrap_or_else(|| DEFAULT_STT_URL.to_string());
        let stt_model = env_or("DUOTALK_STT_MODEL", overlay.stt_model.clone())
            .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string());

        validate_url("translate", &translate_url)?;
        if let Some(url) = &tts_url {
            validate_url("tts", url)?;
        }
        validate_url("stt", &stt_url)?;

        let token = std::env::var("DUOTALK_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(SecretString::from);

        let source: Language = env_or("DUOTALK_SOURCE_LANG", overlay.source_lang.clone())
            .unwrap_or_else(|| "en".to_string())
            .parse()?;
        let target: Language = env_or("DUOTALK_TARGET_LANG", overlay.target_lang.clone())
            .unwrap_or_else(|| "zh".to_string())
            .parse()?;
        let pair = LanguagePair::new(source, target)?;

        let silence_timeout_ms = env_parse("DUOTALK_SILENCE_TIMEOUT_MS")
            .or(overlay.silence_timeout_ms)
            .unwrap_or(DEFAULT_SILENCE_TIMEOUT_MS);
        let request_timeout_secs = env_parse("DUOTALK_REQUEST_TIMEOUT_SECS")
            .or(overlay.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let history_retention =
            env_parse("DUOTALK_HISTORY_RETENTION").or(overlay.history_retention);

        let auto_detect = std::env::var("DUOTALK_AUTO_DETECT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .ok()
            .or(overlay.auto_detect)
            .unwrap_or(false);

        Ok(Self {
            translate_url,
            tts_url,
            stt_url,
            stt_model,
            token,
            pair,
            silence_timeout: Duration::from_millis(silence_timeout_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
            history_retention,
            auto_detect,
            data_dir,
        })
    }

    /// Controller options derived from this configuration
    #[must_use]
    pub const fn turn_options(&self) -> TurnOptions {
        TurnOptions {
            silence_timeout: self.silence_timeout,
            auto_detect: self.auto_detect,
            history_retention: self.history_retention,
        }
    }
}

/// Environment variable with a file-overlay fallback
fn env_or(key: &str, overlay: Option<String>) -> Option<String> {
    std::env::var(key).ok().or(overlay)
}

/// Parsed environment variable, ignoring malformed values
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Reject unparseable endpoint URLs at load time
fn validate_url(what: &str, raw: &str) -> Result<()> {
    url::Url::parse(raw)
        .map(|_| ())
        .map_err(|e| Error::Config(format!("invalid {what} URL {raw}: {e}")))
}

/// Platform data directory (`~/.local/share/omni/duotalk` on Linux)
fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "omni", "omni")
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("duotalk"))
}

/// Read and parse the TOML overlay, falling back to defaults on any failure
fn load_overlay(data_dir: &std::path::Path) -> FileConfig {
    let path = data_dir.join("duotalk.toml");
    if !path.exists() {
        return FileConfig::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config overlay");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config overlay, using defaults"
                );
                FileConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config overlay"
            );
            FileConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_parses() {
        let overlay: FileConfig = toml::from_str(
            r#"
            translate_url = "http://localhost:9000/api/translate"
            source_lang = "id"
            target_lang = "zh"
            silence_timeout_ms = 1000
            history_retention = 50
            auto_detect = true
            "#,
        )
        .unwrap();

        assert_eq!(
            overlay.translate_url.as_deref(),
            Some("http://localhost:9000/api/translate")
        );
        assert_eq!(overlay.silence_timeout_ms, Some(1000));
        assert_eq!(overlay.history_retention, Some(50));
        assert_eq!(overlay.auto_detect, Some(true));
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(validate_url("translate", "not a url").is_err());
        assert!(validate_url("translate", "http://localhost:3000/api/translate").is_ok());
    }
}

//! Error types for duotalk

use thiserror::Error;

/// Result type alias for duotalk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the translation engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone or recognizer authorization refused
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Audio engine or recognizer failed to start
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Connectivity or timeout failure on a remote call
    #[error("network error: {0}")]
    Network(String),

    /// Remote service returned a non-success or malformed response
    #[error("service error: {0}")]
    Service(String),

    /// Finalized utterance was blank; callers drop this silently
    #[error("empty input")]
    EmptyInput,

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify a reqwest failure as `Network` or `Service`
    ///
    /// Connectivity and timeout failures are [`Error::Network`]; everything
    /// else (status, body decode) is [`Error::Service`].
    #[must_use]
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Network(err.to_string())
        } else {
            Self::Service(err.to_string())
        }
    }

    /// Whether this error should be surfaced to the user
    ///
    /// [`Error::EmptyInput`] is the one failure the controller swallows.
    #[must_use]
    pub const fn is_user_visible(&self) -> bool {
        !matches!(self, Self::EmptyInput)
    }
}

//! Speech synthesis and playback
//!
//! Two strategies behind one seam: remote synthesis played through the
//! audio stack, and local on-device synthesis via a platform speech CLI.
//! [`FallbackSpeaker`] composes them, falling back to local on any remote
//! failure.

mod local;
mod remote;
mod speaker;

pub use local::ProcessSynthesizer;
pub use remote::{RemoteTtsClient, play_remote_audio};
pub use speaker::FallbackSpeaker;

use async_trait::async_trait;

use crate::Result;
use crate::language::Language;

/// Fetches synthesized audio from a remote provider
#[async_trait]
pub trait RemoteSynthesis: Send + Sync {
    /// Synthesize `text`, returning the audio bytes
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Network`] or [`crate::Error::Service`] on
    /// failure; callers recover via local fallback
    async fn fetch(&self, text: &str, language: Language) -> Result<Vec<u8>>;
}

/// Speaks text aloud
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Synthesize and play `text` in `language`, returning when playback
    /// completes or is stopped
    ///
    /// # Errors
    ///
    /// Returns error if synthesis and playback both fail
    async fn speak(&self, text: &str, language: Language) -> Result<()>;

    /// Cancel any in-progress playback immediately
    ///
    /// Synchronous, idempotent, and safe to call when nothing is playing.
    fn stop(&self);
}

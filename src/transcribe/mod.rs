//! Streaming transcription sources
//!
//! A [`TranscriptionSource`] turns microphone speech into a stream of
//! partial and final transcript events. The built-in [`MicTranscriber`]
//! segments captured audio locally and re-transcribes the accumulated
//! utterance through a remote Whisper-style endpoint.

mod mic;
mod segment;
mod stt;

pub use mic::MicTranscriber;
pub use segment::UtteranceSegmenter;
pub use stt::SttClient;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;
use crate::language::Language;

/// One transcript update from a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    /// Full recognized text of the utterance so far
    pub text: String,
    /// Whether the source considers the utterance complete
    pub is_final: bool,
}

/// A continuous speech-to-text stream
///
/// At most one transcription may be active per source. Calling `start`
/// while active fully tears down the previous stream (audio device
/// released, in-flight recognition dropped) before the new one begins;
/// `stop` on an inactive source is a no-op. An authorization failure
/// surfaces [`crate::Error::PermissionDenied`] and leaves the source
/// inactive with no partial start.
#[async_trait]
pub trait TranscriptionSource: Send {
    /// Begin transcribing in `language`, returning the event stream
    ///
    /// The stream ends when `stop` is called or the source fails.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PermissionDenied`] or
    /// [`crate::Error::DeviceUnavailable`] if capture cannot start.
    async fn start(&mut self, language: Language) -> Result<mpsc::Receiver<TranscriptEvent>>;

    /// Tear down the active stream; no-op when inactive
    async fn stop(&mut self);
}

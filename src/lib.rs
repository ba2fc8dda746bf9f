//! duotalk - real-time bidirectional voice translation engine
//!
//! This library provides a per-session turn controller that coordinates:
//! - Microphone capture and streaming transcription
//! - Silence-debounced utterance finalization
//! - Remote text translation
//! - Speech playback with local fallback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Presentation layer                    │
//! │       toggle / swap / stop  │  session events        │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Turn controller                       │
//! │  Listening → Finalizing → Translating → Speaking     │
//! └──────┬──────────────┬──────────────┬────────────────┘
//!        │              │              │
//! ┌──────▼─────┐ ┌──────▼──────┐ ┌─────▼────────────────┐
//! │ Transcribe │ │  Translate  │ │ Speech (remote TTS    │
//! │ (mic+STT)  │ │  gateway    │ │  with local fallback) │
//! └────────────┘ └─────────────┘ └──────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod history;
pub mod language;
pub mod speech;
pub mod transcribe;
pub mod translate;
pub mod turn;

pub use config::Config;
pub use error::{Error, Result};
pub use history::{TranslationHistory, TranslationResult, Utterance};
pub use language::{Language, LanguageDetector, LanguagePair};
pub use speech::{
    FallbackSpeaker, ProcessSynthesizer, RemoteSynthesis, RemoteTtsClient, SpeechOutput,
};
pub use transcribe::{
    MicTranscriber, SttClient, TranscriptEvent, TranscriptionSource, UtteranceSegmenter,
};
pub use translate::{TranslationGateway, Translator};
pub use turn::{ControllerHandle, SessionEvent, Side, TurnController, TurnOptions, TurnState};

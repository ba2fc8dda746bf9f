//! Remote-first speech output with local fallback

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::Result;
use crate::language::Language;
use crate::speech::remote::play_remote_audio;
use crate::speech::{RemoteSynthesis, SpeechOutput};

/// Speaks via the remote synthesis endpoint, falling back to local
/// on-device synthesis on any remote failure
///
/// Fallback covers network failures, non-success statuses, empty payloads,
/// and player failures, and is never surfaced to the caller. With no remote
/// client configured, every request goes straight to local.
pub struct FallbackSpeaker {
    remote: Option<Box<dyn RemoteSynthesis>>,
    local: Box<dyn SpeechOutput>,
    // Fresh flag per playback so a stale stop() cannot cancel a later turn
    playback_stop: Mutex<Arc<AtomicBool>>,
}

impl FallbackSpeaker {
    /// Compose a speaker from an optional remote client and a local engine
    #[must_use]
    pub fn new(remote: Option<Box<dyn RemoteSynthesis>>, local: Box<dyn SpeechOutput>) -> Self {
        Self {
            remote,
            local,
            playback_stop: Mutex::new(Arc::new(AtomicBool::new(false))),
        }
    }

    /// Install and return a fresh stop flag for a new playback
    fn fresh_stop_flag(&self) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        if let Ok(mut guard) = self.playback_stop.lock() {
            *guard = Arc::clone(&flag);
        }
        flag
    }

    async fn try_remote(&self, text: &str, language: Language) -> Option<()> {
        let remote = self.remote.as_ref()?;

        let audio = match remote.fetch(text, language).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, "remote synthesis failed, falling back to local");
                return None;
            }
        };

        let stop = self.fresh_stop_flag();
        match play_remote_audio(audio, stop).await {
            Ok(()) => Some(()),
            Err(e) => {
                tracing::warn!(error = %e, "remote playback failed, falling back to local");
                None
            }
        }
    }
}

#[async_trait]
impl SpeechOutput for FallbackSpeaker {
    async fn speak(&self, text: &str, language: Language) -> Result<()> {
        if self.try_remote(text, language).await.is_some() {
            return Ok(());
        }

        self.local.speak(text, language).await
    }

    fn stop(&self) {
        if let Ok(guard) = self.playback_stop.lock() {
            guard.store(true, Ordering::Relaxed);
        }
        self.local.stop();
    }
}

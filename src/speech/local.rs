//! Local on-device synthesis via a platform speech CLI

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::language::Language;
use crate::speech::SpeechOutput;
use crate::{Error, Result};

/// Poll interval while waiting for the child to finish
const WAIT_INTERVAL: Duration = Duration::from_millis(50);

/// Which speech CLI was found on this host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    /// macOS `say`
    Say,
    /// `espeak-ng` or `espeak`
    Espeak,
}

/// Local synthesis by shelling out to the host's speech CLI
///
/// Always available as the fallback strategy: discovery fails only on
/// hosts with no speech CLI at all, which is surfaced at composition time
/// rather than mid-turn.
pub struct ProcessSynthesizer {
    program: PathBuf,
    engine: Engine,
    current: Mutex<Option<Child>>,
}

impl ProcessSynthesizer {
    /// Find the first available speech CLI
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no speech CLI is installed
    pub fn discover() -> Result<Self> {
        for (name, engine) in [
            ("say", Engine::Say),
            ("espeak-ng", Engine::Espeak),
            ("espeak", Engine::Espeak),
        ] {
            if let Ok(program) = which::which(name) {
                tracing::debug!(program = %program.display(), "local synthesis engine found");
                return Ok(Self {
                    program,
                    engine,
                    current: Mutex::new(None),
                });
            }
        }

        Err(Error::Config(
            "no local speech engine found (tried say, espeak-ng, espeak)".to_string(),
        ))
    }

    /// Preferred `say` voice for a language, higher-quality voices first
    const fn say_voice(language: Language) -> Option<&'static str> {
        match language {
            Language::English => Some("Samantha"),
            Language::Mandarin => Some("Tingting"),
            Language::Indonesian => Some("Damayanti"),
            Language::Vietnamese => Some("Linh"),
            Language::Korean => Some("Yuna"),
            Language::Japanese => Some("Kyoko"),
            Language::French => Some("Thomas"),
            Language::German => Some("Anna"),
            Language::Spanish => Some("Monica"),
            Language::Russian => Some("Milena"),
            Language::Italian => Some("Alice"),
        }
    }

    fn build_command(&self, text: &str, language: Language) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.engine {
            Engine::Say => {
                if let Some(voice) = Self::say_voice(language) {
                    cmd.arg("-v").arg(voice);
                }
                cmd.arg(text);
            }
            Engine::Espeak => {
                cmd.arg("-v").arg(language.code()).arg(text);
            }
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SpeechOutput for ProcessSynthesizer {
    async fn speak(&self, text: &str, language: Language) -> Result<()> {
        // Only one child at a time; replace any leftover
        self.stop();

        let child = self
            .build_command(text, language)
            .spawn()
            .map_err(|e| Error::Tts(format!("failed to spawn speech engine: {e}")))?;

        tracing::debug!(engine = ?self.engine, language = %language, "local synthesis started");

        if let Ok(mut guard) = self.current.lock() {
            *guard = Some(child);
        }

        // Poll rather than holding the lock across an await, so stop() can
        // reach the child at any time
        loop {
            tokio::time::sleep(WAIT_INTERVAL).await;

            let Ok(mut guard) = self.current.lock() else {
                return Ok(());
            };
            match guard.as_mut() {
                None => return Ok(()), // stopped
                Some(child) => match child.try_wait() {
                    Ok(Some(status)) => {
                        *guard = None;
                        if status.success() {
                            return Ok(());
                        }
                        return Err(Error::Tts(format!("speech engine exited with {status}")));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        *guard = None;
                        return Err(Error::Tts(e.to_string()));
                    }
                },
            }
        }
    }

    fn stop(&self) {
        if let Ok(mut guard) = self.current.lock() {
            if let Some(mut child) = guard.take() {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = %e, "speech engine already exited");
                }
            }
        }
    }
}

//! Turn controller
//!
//! The per-session state machine coordinating capture, silence-debounced
//! finalization, translation, and playback. All session state lives on one
//! owning task; collaborator completions come back as messages, tagged
//! with a turn sequence number so cancelled work is discarded instead of
//! mutating a newer turn.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::history::{TranslationHistory, TranslationResult, Utterance};
use crate::language::{Language, LanguageDetector, LanguagePair};
use crate::speech::SpeechOutput;
use crate::Result;
use crate::transcribe::{TranscriptEvent, TranscriptionSource};
use crate::translate::Translator;

/// Default debounce after the last partial before an utterance is complete
pub const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_millis(1200);

/// Conversation side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Session state; at most one side is ever non-idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Waiting for a toggle
    Idle,
    /// Capturing speech for a side
    Listening(Side),
    /// Tearing down capture and detecting language
    Finalizing(Side),
    /// Translation request in flight
    Translating(Side),
    /// Playing the translated speech; a new toggle barges in
    Speaking(Side),
}

/// Events emitted to the presentation layer
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The state machine moved
    StateChanged(TurnState),
    /// A partial transcript update while listening
    Partial {
        /// Side being listened to
        side: Side,
        /// Full recognized text so far
        text: String,
    },
    /// A turn finished; the result is already in the history
    TurnCompleted(TranslationResult),
    /// A turn failed with a user-visible message
    TurnFailed {
        /// Side the turn belonged to
        side: Side,
        /// User-readable description
        message: String,
    },
    /// The language pair orientation changed (explicit swap or
    /// auto-detection)
    LanguagesSwapped(LanguagePair),
}

/// Session tuning
#[derive(Debug, Clone)]
pub struct TurnOptions {
    /// Debounce after the last partial before finalization
    pub silence_timeout: Duration,
    /// Re-orient the pair from detected utterance language
    pub auto_detect: bool,
    /// History retention cap (`None` = unbounded)
    pub history_retention: Option<usize>,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            silence_timeout: DEFAULT_SILENCE_TIMEOUT,
            auto_detect: false,
            history_retention: None,
        }
    }
}

/// Commands from the handle
enum Command {
    Toggle(Side),
    SwapLanguages,
    StopSpeaking,
    History(oneshot::Sender<Vec<TranslationResult>>),
    Shutdown,
}

/// Everything the owning task can receive
enum Msg {
    Command(Command),
    Transcript {
        seq: u64,
        event: TranscriptEvent,
    },
    Translated {
        seq: u64,
        side: Side,
        source_text: String,
        source: Language,
        target: Language,
        outcome: Result<String>,
    },
    SpokeDone {
        seq: u64,
        outcome: Result<()>,
    },
}

/// Why finalization was triggered
#[derive(Debug, Clone, Copy)]
enum FinalizeTrigger {
    SilenceTimeout,
    FinalTranscript,
    ExplicitStop,
}

/// Cloneable handle to a running controller
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Msg>,
}

impl ControllerHandle {
    /// Toggle listening on a side (start, explicit-stop, or switch sides)
    pub fn toggle(&self, side: Side) {
        let _ = self.tx.send(Msg::Command(Command::Toggle(side)));
    }

    /// Exchange source and target languages
    pub fn swap_languages(&self) {
        let _ = self.tx.send(Msg::Command(Command::SwapLanguages));
    }

    /// Cancel any in-progress playback
    pub fn stop_speaking(&self) {
        let _ = self.tx.send(Msg::Command(Command::StopSpeaking));
    }

    /// Snapshot of the translation history, most recent first
    pub async fn history(&self) -> Vec<TranslationResult> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Msg::Command(Command::History(tx))).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Stop the controller task
    pub fn shutdown(&self) {
        let _ = self.tx.send(Msg::Command(Command::Shutdown));
    }
}

/// The per-session turn controller
pub struct TurnController {
    source: Box<dyn TranscriptionSource>,
    translator: Arc<dyn Translator>,
    speaker: Arc<dyn SpeechOutput>,
    pair: LanguagePair,
    opts: TurnOptions,
    events: mpsc::UnboundedSender<SessionEvent>,

    state: TurnState,
    utterance: Option<Utterance>,
    forwarder: Option<tokio::task::JoinHandle<()>>,
    silence_deadline: Option<Instant>,
    finalize_pending: bool,
    turn_seq: u64,
    history: TranslationHistory,

    inbox_tx: mpsc::UnboundedSender<Msg>,
    inbox_rx: Option<mpsc::UnboundedReceiver<Msg>>,
}

impl TurnController {
    /// Create a controller and its handle
    ///
    /// Spawn [`Self::run`] on the session's runtime to start it.
    #[must_use]
    pub fn new(
        source: Box<dyn TranscriptionSource>,
        translator: Arc<dyn Translator>,
        speaker: Arc<dyn SpeechOutput>,
        pair: LanguagePair,
        opts: TurnOptions,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> (Self, ControllerHandle) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let handle = ControllerHandle {
            tx: inbox_tx.clone(),
        };
        let history = TranslationHistory::new(opts.history_retention);

        let controller = Self {
            source,
            translator,
            speaker,
            pair,
            opts,
            events,
            state: TurnState::Idle,
            utterance: None,
            forwarder: None,
            silence_deadline: None,
            finalize_pending: false,
            turn_seq: 0,
            history,
            inbox_tx,
            inbox_rx: Some(inbox_rx),
        };

        (controller, handle)
    }

    /// Convenience: create, spawn, and return the handle
    #[must_use]
    pub fn spawn(
        source: Box<dyn TranscriptionSource>,
        translator: Arc<dyn Translator>,
        speaker: Arc<dyn SpeechOutput>,
        pair: LanguagePair,
        opts: TurnOptions,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> ControllerHandle {
        let (controller, handle) = Self::new(source, translator, speaker, pair, opts, events);
        tokio::spawn(controller.run());
        handle
    }

    /// Run the owning task until shutdown
    pub async fn run(mut self) {
        // The receiver leaves self so select! can poll it while handlers
        // borrow the rest of the controller
        let Some(mut inbox) = self.inbox_rx.take() else {
            return;
        };

        loop {
            let armed = matches!(self.state, TurnState::Listening(_))
                && !self.finalize_pending
                && self.silence_deadline.is_some();

            let msg = if armed {
                // Deadline checked above
                let deadline = self.silence_deadline.unwrap_or_else(Instant::now);
                tokio::select! {
                    msg = inbox.recv() => msg,
                    () = tokio::time::sleep_until(deadline) => {
                        self.finalize(FinalizeTrigger::SilenceTimeout).await;
                        continue;
                    }
                }
            } else {
                inbox.recv().await
            };

            let Some(msg) = msg else { break };
            match msg {
                Msg::Command(cmd) => {
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
                Msg::Transcript { seq, event } => self.handle_transcript(seq, event).await,
                Msg::Translated {
                    seq,
                    side,
                    source_text,
                    source,
                    target,
                    outcome,
                } => self.handle_translated(seq, side, source_text, source, target, outcome),
                Msg::SpokeDone { seq, outcome } => self.handle_spoke_done(seq, &outcome),
            }
        }

        tracing::debug!("turn controller stopped");
    }

    /// Returns false when the controller should shut down
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Toggle(side) => self.handle_toggle(side).await,
            Command::SwapLanguages => self.handle_swap(),
            Command::StopSpeaking => {
                self.speaker.stop();
                if matches!(self.state, TurnState::Speaking(_)) {
                    self.set_state(TurnState::Idle);
                }
            }
            Command::History(reply) => {
                let snapshot: Vec<_> = self.history.entries().cloned().collect();
                let _ = reply.send(snapshot);
            }
            Command::Shutdown => {
                self.teardown().await;
                return false;
            }
        }
        true
    }

    async fn handle_toggle(&mut self, side: Side) {
        match self.state {
            TurnState::Listening(current) if current == side => {
                // Same side pressed again: explicit finalize, no waiting for
                // the silence timer
                self.finalize(FinalizeTrigger::ExplicitStop).await;
            }
            TurnState::Listening(_) => {
                // Mutual exclusion: the current side is fully stopped before
                // the other side's capture starts
                self.cancel_turn().await;
                self.start_listening(side).await;
            }
            TurnState::Idle
            | TurnState::Finalizing(_)
            | TurnState::Translating(_)
            | TurnState::Speaking(_) => {
                // Barge-in: a new listen interrupts playback and abandons
                // any in-flight turn
                self.cancel_turn().await;
                self.start_listening(side).await;
            }
        }
    }

    fn handle_swap(&mut self) {
        if !matches!(self.state, TurnState::Idle | TurnState::Speaking(_)) {
            tracing::debug!(state = ?self.state, "swap ignored mid-turn");
            return;
        }
        self.pair.swap();
        self.emit(SessionEvent::LanguagesSwapped(self.pair));
    }

    async fn start_listening(&mut self, side: Side) {
        let language = self.language_for(side);

        let rx = match self.source.start(language).await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::warn!(error = %e, "failed to start listening");
                self.emit(SessionEvent::TurnFailed {
                    side,
                    message: e.to_string(),
                });
                self.set_state(TurnState::Idle);
                return;
            }
        };

        let seq = self.turn_seq;
        let tx = self.inbox_tx.clone();
        self.forwarder = Some(tokio::spawn(async move {
            let mut rx = rx;
            while let Some(event) = rx.recv().await {
                if tx.send(Msg::Transcript { seq, event }).is_err() {
                    break;
                }
            }
        }));

        self.utterance = Some(Utterance::new(language));
        self.finalize_pending = false;
        self.silence_deadline = None;
        self.set_state(TurnState::Listening(side));
    }

    async fn handle_transcript(&mut self, seq: u64, event: TranscriptEvent) {
        if seq != self.turn_seq || self.finalize_pending {
            return;
        }
        let TurnState::Listening(side) = self.state else {
            return;
        };

        if let Some(utterance) = self.utterance.as_mut() {
            utterance.update(&event.text);
        }

        if event.is_final {
            self.finalize(FinalizeTrigger::FinalTranscript).await;
            return;
        }

        self.emit(SessionEvent::Partial {
            side,
            text: event.text,
        });
        self.silence_deadline = Some(Instant::now() + self.opts.silence_timeout);
    }

    /// Finalize the current listening session exactly once
    ///
    /// Duplicate triggers (timer plus final transcript, or an explicit stop
    /// racing the timer) are ignored via the single-flight guard.
    async fn finalize(&mut self, trigger: FinalizeTrigger) {
        let TurnState::Listening(side) = self.state else {
            return;
        };
        if self.finalize_pending {
            return;
        }
        self.finalize_pending = true;
        self.silence_deadline = None;
        self.set_state(TurnState::Finalizing(side));
        tracing::debug!(?trigger, "finalizing utterance");

        self.stop_source().await;

        let Some(mut utterance) = self.utterance.take() else {
            self.set_state(TurnState::Idle);
            return;
        };

        if utterance.is_blank() {
            // Blank finalized text is dropped silently, never surfaced
            tracing::debug!("empty utterance, skipping turn");
            self.set_state(TurnState::Idle);
            return;
        }

        let text = utterance.finalize().to_string();
        let source = self.orient(&text, utterance.language);
        let Some(target) = self.pair.other(source) else {
            // Pair membership is an orient() invariant
            self.set_state(TurnState::Idle);
            return;
        };

        self.set_state(TurnState::Translating(side));

        let translator = Arc::clone(&self.translator);
        let tx = self.inbox_tx.clone();
        let seq = self.turn_seq;
        tokio::spawn(async move {
            let outcome = translator.translate(&text, source, target).await;
            let _ = tx.send(Msg::Translated {
                seq,
                side,
                source_text: text,
                source,
                target,
                outcome,
            });
        });
    }

    /// Pick the turn's source language, re-orienting the pair when
    /// auto-detection identifies the other member
    fn orient(&mut self, text: &str, captured: Language) -> Language {
        if !self.opts.auto_detect {
            return captured;
        }

        let detector = LanguageDetector::new(self.pair);
        let Some(detected) = detector.detect(text) else {
            return captured;
        };

        if detected != self.pair.source {
            self.pair.swap();
            tracing::debug!(detected = %detected, pair = %self.pair, "pair re-oriented");
            self.emit(SessionEvent::LanguagesSwapped(self.pair));
        }
        detected
    }

    fn handle_translated(
        &mut self,
        seq: u64,
        side: Side,
        source_text: String,
        source: Language,
        target: Language,
        outcome: Result<String>,
    ) {
        if seq != self.turn_seq {
            tracing::debug!("stale translation result dropped");
            return;
        }
        if !matches!(self.state, TurnState::Translating(_)) {
            return;
        }

        match outcome {
            Ok(target_text) => {
                let result = TranslationResult {
                    source_text,
                    source_language: source,
                    target_text: target_text.clone(),
                    target_language: target,
                    created_at: Utc::now(),
                };
                self.history.push(result.clone());
                self.emit(SessionEvent::TurnCompleted(result));
                self.set_state(TurnState::Speaking(side));

                let speaker = Arc::clone(&self.speaker);
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    let outcome = speaker.speak(&target_text, target).await;
                    let _ = tx.send(Msg::SpokeDone { seq, outcome });
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "translation failed");
                self.emit(SessionEvent::TurnFailed {
                    side,
                    message: e.to_string(),
                });
                self.set_state(TurnState::Idle);
            }
        }
    }

    fn handle_spoke_done(&mut self, seq: u64, outcome: &Result<()>) {
        if let Err(e) = outcome {
            // Local fallback already absorbed remote failures; anything left
            // is logged, not surfaced
            tracing::warn!(error = %e, "playback failed");
        }
        if seq == self.turn_seq && matches!(self.state, TurnState::Speaking(_)) {
            self.set_state(TurnState::Idle);
        }
    }

    /// Abandon the current turn: stop playback and capture, drop pending
    /// completions, and reset per-turn state
    async fn cancel_turn(&mut self) {
        self.speaker.stop();
        self.stop_source().await;
        self.utterance = None;
        self.silence_deadline = None;
        self.finalize_pending = false;
        self.turn_seq += 1;
    }

    /// Stop the transcription source and its forwarder
    async fn stop_source(&mut self) {
        self.source.stop().await;
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }

    async fn teardown(&mut self) {
        self.cancel_turn().await;
        self.set_state(TurnState::Idle);
    }

    const fn language_for(&self, side: Side) -> Language {
        match side {
            Side::Left => self.pair.source,
            Side::Right => self.pair.target,
        }
    }

    fn set_state(&mut self, state: TurnState) {
        if self.state != state {
            self.state = state;
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

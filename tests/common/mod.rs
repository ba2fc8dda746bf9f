//! Shared test utilities
//!
//! Scripted collaborators injected through the library's trait seams so
//! controller behavior can be driven without audio hardware or a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

use duotalk::speech::SpeechOutput;
use duotalk::transcribe::{TranscriptEvent, TranscriptionSource};
use duotalk::translate::Translator;
use duotalk::turn::SessionEvent;
use duotalk::{Error, Language, Result};

/// One recorded transcription-source operation, for ordering assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOp {
    Start(Language),
    Stop,
}

struct SourceInner {
    feed: Option<mpsc::Sender<TranscriptEvent>>,
    ops: Vec<SourceOp>,
    fail_next: Option<Error>,
}

/// Shared state of a [`ScriptedSource`], held by the test
pub struct SourceState {
    inner: Mutex<SourceInner>,
}

impl SourceState {
    /// Record of start/stop operations in order
    pub fn ops(&self) -> Vec<SourceOp> {
        self.inner.lock().unwrap().ops.clone()
    }

    /// Make the next `start` fail with `err`
    pub fn fail_next_start(&self, err: Error) {
        self.inner.lock().unwrap().fail_next = Some(err);
    }

    /// Wait until the controller has started a stream
    ///
    /// Polling is cheap under the tests' paused clock: the sleep advances
    /// virtual time instantly once the runtime is idle.
    pub async fn wait_started(&self) {
        loop {
            if self.inner.lock().unwrap().feed.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Feed a transcript event into the active stream
    pub async fn feed(&self, text: &str, is_final: bool) {
        let sender = self.inner.lock().unwrap().feed.clone();
        if let Some(sender) = sender {
            let _ = sender
                .send(TranscriptEvent {
                    text: text.to_string(),
                    is_final,
                })
                .await;
        }
    }
}

/// Transcription source driven by the test instead of a microphone
pub struct ScriptedSource {
    state: Arc<SourceState>,
    active: bool,
}

impl ScriptedSource {
    pub fn new() -> (Self, Arc<SourceState>) {
        let state = Arc::new(SourceState {
            inner: Mutex::new(SourceInner {
                feed: None,
                ops: Vec::new(),
                fail_next: None,
            }),
        });
        (
            Self {
                state: Arc::clone(&state),
                active: false,
            },
            state,
        )
    }
}

#[async_trait]
impl TranscriptionSource for ScriptedSource {
    async fn start(&mut self, language: Language) -> Result<mpsc::Receiver<TranscriptEvent>> {
        self.stop().await;

        let mut inner = self.state.inner.lock().unwrap();
        if let Some(err) = inner.fail_next.take() {
            return Err(err);
        }

        let (tx, rx) = mpsc::channel(16);
        inner.feed = Some(tx);
        inner.ops.push(SourceOp::Start(language));
        drop(inner);

        self.active = true;
        Ok(rx)
    }

    async fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        let mut inner = self.state.inner.lock().unwrap();
        inner.feed = None;
        inner.ops.push(SourceOp::Stop);
    }
}

/// Translator returning scripted responses
pub struct MockTranslator {
    responses: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<(String, Language, Language)>>,
}

impl MockTranslator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Queue the next response; without one, `translate` echoes
    /// `t(<text>)`
    pub fn respond_with(&self, response: Result<String>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Calls made so far as `(text, source, target)`
    pub fn calls(&self) -> Vec<(String, Language, Language)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, source: Language, target: Language) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), source, target));

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("t({text})")))
    }
}

/// Speech output recording what it was asked to speak
pub struct MockSpeaker {
    spoken: Mutex<Vec<(String, Language)>>,
    stops: AtomicUsize,
    cancel: Notify,
    speak_duration: Duration,
}

impl MockSpeaker {
    pub fn new() -> Arc<Self> {
        Self::with_duration(Duration::ZERO)
    }

    /// A speaker whose playback takes `speak_duration` (virtual time)
    /// unless stopped
    pub fn with_duration(speak_duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            spoken: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            cancel: Notify::new(),
            speak_duration,
        })
    }

    pub fn spoken(&self) -> Vec<(String, Language)> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SpeechOutput for MockSpeaker {
    async fn speak(&self, text: &str, language: Language) -> Result<()> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), language));

        if !self.speak_duration.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(self.speak_duration) => {}
                () = self.cancel.notified() => {}
            }
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
        self.cancel.notify_waiters();
    }
}

/// Receive the next session event, panicking after a virtual-time deadline
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed")
}

/// Drain events until one matches `predicate`, panicking on timeout
pub async fn wait_for_event<F>(
    rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    mut predicate: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    loop {
        let event = next_event(rx).await;
        if predicate(&event) {
            return event;
        }
    }
}

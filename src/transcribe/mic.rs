//! Microphone-backed transcription source
//!
//! A dedicated capture thread owns the cpal stream (not `Send`) and feeds
//! raw sample chunks to an async pump, which segments them and
//! re-transcribes the accumulated utterance through the remote recognizer,
//! emitting growing partial transcripts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::audio::{AudioSessionConfigurer, MicCapture, SAMPLE_RATE, samples_to_wav};
use crate::language::Language;
use crate::transcribe::{SttClient, TranscriptEvent, TranscriptionSource, UtteranceSegmenter};
use crate::{Error, Result};

/// How often the capture thread drains the device buffer
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Capacity of the raw-audio channel between capture thread and pump
const AUDIO_CHANNEL_CAPACITY: usize = 32;

/// Capacity of the transcript event channel
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Live capture resources torn down on stop
struct ActiveStream {
    shutdown: Arc<AtomicBool>,
    capture_thread: std::thread::JoinHandle<()>,
    pump: tokio::task::JoinHandle<()>,
}

/// Microphone [`TranscriptionSource`] backed by a remote recognizer
pub struct MicTranscriber {
    stt: SttClient,
    session: Arc<dyn AudioSessionConfigurer>,
    active: Option<ActiveStream>,
}

impl MicTranscriber {
    /// Create a transcriber using `stt` for recognition
    #[must_use]
    pub fn new(stt: SttClient, session: Arc<dyn AudioSessionConfigurer>) -> Self {
        Self {
            stt,
            session,
            active: None,
        }
    }

    /// Spawn the capture thread, waiting for the device to open
    async fn spawn_capture(
        shutdown: Arc<AtomicBool>,
        audio_tx: mpsc::Sender<Vec<f32>>,
    ) -> Result<std::thread::JoinHandle<()>> {
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let thread_shutdown = Arc::clone(&shutdown);

        let handle = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let mut capture = match MicCapture::new().and_then(|mut c| {
                    c.start()?;
                    Ok(c)
                }) {
                    Ok(c) => {
                        let _ = ready_tx.send(Ok(()));
                        c
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while !thread_shutdown.load(Ordering::Relaxed) {
                    std::thread::sleep(DRAIN_INTERVAL);

                    if capture.has_failed() {
                        tracing::error!("capture device failed, ending stream");
                        break;
                    }

                    let samples = capture.take_buffer();
                    if samples.is_empty() {
                        continue;
                    }
                    if audio_tx.blocking_send(samples).is_err() {
                        break;
                    }
                }

                capture.stop();
            })
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => {
                // Thread already exited; nothing to clean up
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(Error::DeviceUnavailable(
                "capture thread died during startup".to_string(),
            )),
        }
    }

    /// Run the segment-and-transcribe pump until the audio stream ends
    async fn run_pump(
        stt: SttClient,
        language: Language,
        mut audio_rx: mpsc::Receiver<Vec<f32>>,
        events: mpsc::Sender<TranscriptEvent>,
    ) {
        let mut segmenter = UtteranceSegmenter::new();

        while let Some(samples) = audio_rx.recv().await {
            if !segmenter.push(&samples) {
                continue;
            }

            let wav = match samples_to_wav(segmenter.audio(), SAMPLE_RATE) {
                Ok(wav) => wav,
                Err(e) => {
                    tracing::error!(error = %e, "WAV encoding failed");
                    continue;
                }
            };

            match stt.transcribe(wav, language).await {
                Ok(text) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let event = TranscriptEvent {
                        text: trimmed.to_string(),
                        is_final: false,
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    // A failed pass costs one partial; the next pass retries
                    // with more audio
                    tracing::warn!(error = %e, "transcription pass failed");
                }
            }
        }

        tracing::debug!("transcription pump ended");
    }
}

#[async_trait]
impl TranscriptionSource for MicTranscriber {
    async fn start(&mut self, language: Language) -> Result<mpsc::Receiver<TranscriptEvent>> {
        // Full teardown of any previous stream before touching the device
        self.stop().await;

        // Authorization is checked before any resource is allocated so a
        // denial leaves the source inactive with no partial start
        MicCapture::authorize()?;
        self.session.configure_capture()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let (audio_tx, audio_rx) = mpsc::channel::<Vec<f32>>(AUDIO_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<TranscriptEvent>(EVENT_CHANNEL_CAPACITY);

        let capture_thread = Self::spawn_capture(Arc::clone(&shutdown), audio_tx).await?;

        let pump = tokio::spawn(Self::run_pump(
            self.stt.clone(),
            language,
            audio_rx,
            event_tx,
        ));

        self.active = Some(ActiveStream {
            shutdown,
            capture_thread,
            pump,
        });

        tracing::debug!(language = %language, "transcription started");
        Ok(event_rx)
    }

    async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.shutdown.store(true, Ordering::Relaxed);
        active.pump.abort();

        // Wait for the capture thread so the device is released before any
        // new stream opens it
        let _ = tokio::task::spawn_blocking(move || {
            let _ = active.capture_thread.join();
        })
        .await;

        tracing::debug!("transcription stopped");
    }
}

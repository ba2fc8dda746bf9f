//! Speech fallback integration tests
//!
//! Exercises the remote-to-local fallback chain with scripted remote
//! providers; no network or audio hardware involved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use duotalk::speech::{FallbackSpeaker, RemoteSynthesis, SpeechOutput};
use duotalk::{Error, Language, Result};

/// Remote provider that always fails the same way
struct FailingRemote {
    error: fn() -> Error,
    calls: AtomicUsize,
}

impl FailingRemote {
    fn new(error: fn() -> Error) -> Arc<Self> {
        Arc::new(Self {
            error,
            calls: AtomicUsize::new(0),
        })
    }
}

/// Newtype wrapper so the external `RemoteSynthesis` trait can be
/// implemented against a shared `FailingRemote`; orphan rules forbid
/// `impl RemoteSynthesis for Arc<_>` directly (mirrors `SharedLocal`).
struct SharedRemote(Arc<FailingRemote>);

#[async_trait]
impl RemoteSynthesis for SharedRemote {
    async fn fetch(&self, _text: &str, _language: Language) -> Result<Vec<u8>> {
        self.0.calls.fetch_add(1, Ordering::Relaxed);
        Err((self.0.error)())
    }
}

/// Remote provider returning undecodable bytes, so playback itself fails
struct GarbageRemote;

#[async_trait]
impl RemoteSynthesis for GarbageRemote {
    async fn fetch(&self, _text: &str, _language: Language) -> Result<Vec<u8>> {
        Ok(vec![0xde, 0xad, 0xbe, 0xef])
    }
}

/// Local engine that records what it was asked to speak
#[derive(Default)]
struct LocalProbe {
    spoken: Mutex<Vec<(String, Language)>>,
    stops: AtomicUsize,
}

struct SharedLocal(Arc<LocalProbe>);

#[async_trait]
impl SpeechOutput for SharedLocal {
    async fn speak(&self, text: &str, language: Language) -> Result<()> {
        self.0
            .spoken
            .lock()
            .unwrap()
            .push((text.to_string(), language));
        Ok(())
    }

    fn stop(&self) {
        self.0.stops.fetch_add(1, Ordering::Relaxed);
    }
}

fn probe() -> (Arc<LocalProbe>, Box<dyn SpeechOutput>) {
    let probe = Arc::new(LocalProbe::default());
    let local: Box<dyn SpeechOutput> = Box::new(SharedLocal(Arc::clone(&probe)));
    (probe, local)
}

/// A remote service error (HTTP 500) falls back to local synthesis with
/// the same text and language, and no error reaches the caller.
#[tokio::test]
async fn service_error_falls_back_to_local() {
    let remote = FailingRemote::new(|| Error::Service("TTS error 500: boom".to_string()));
    let (local_probe, local) = probe();
    let speaker = FallbackSpeaker::new(Some(Box::new(SharedRemote(Arc::clone(&remote)))), local);

    speaker
        .speak("你好", Language::Mandarin)
        .await
        .expect("fallback must absorb the remote failure");

    assert_eq!(remote.calls.load(Ordering::Relaxed), 1);
    assert_eq!(
        local_probe.spoken.lock().unwrap().clone(),
        vec![("你好".to_string(), Language::Mandarin)]
    );
}

/// Network failures fall back exactly like service errors.
#[tokio::test]
async fn network_error_falls_back_to_local() {
    let remote = FailingRemote::new(|| Error::Network("connection refused".to_string()));
    let (local_probe, local) = probe();
    let speaker = FallbackSpeaker::new(Some(Box::new(SharedRemote(Arc::clone(&remote)))), local);

    speaker.speak("hello", Language::English).await.unwrap();

    assert_eq!(local_probe.spoken.lock().unwrap().len(), 1);
}

/// Undecodable remote audio is a player failure; the turn still speaks
/// through the local engine.
#[tokio::test]
async fn player_failure_falls_back_to_local() {
    let (local_probe, local) = probe();
    let speaker = FallbackSpeaker::new(Some(Box::new(GarbageRemote)), local);

    speaker.speak("hello", Language::English).await.unwrap();

    assert_eq!(
        local_probe.spoken.lock().unwrap().clone(),
        vec![("hello".to_string(), Language::English)]
    );
}

/// Without a remote client, speech goes straight to local.
#[tokio::test]
async fn no_remote_goes_straight_to_local() {
    let (local_probe, local) = probe();
    let speaker = FallbackSpeaker::new(None, local);

    speaker.speak("hello", Language::English).await.unwrap();

    assert_eq!(local_probe.spoken.lock().unwrap().len(), 1);
}

/// `stop` is safe with nothing playing and always reaches the local
/// engine.
#[tokio::test]
async fn stop_is_safe_when_idle() {
    let (local_probe, local) = probe();
    let speaker = FallbackSpeaker::new(None, local);

    speaker.stop();
    speaker.stop();

    assert_eq!(local_probe.stops.load(Ordering::Relaxed), 2);
}

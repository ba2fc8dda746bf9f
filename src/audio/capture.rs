//! Microphone capture

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for capture (16kHz mono, what the STT providers expect)
pub const SAMPLE_RATE: u32 = 16000;

/// Cached result of the one-time input authorization probe
static AUTHORIZED: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Captures microphone audio into a shared sample buffer
///
/// `start` is idempotent while a stream is live; `stop` on an inactive
/// capture is a no-op. The cpal stream must stay on the thread that built it.
pub struct MicCapture {
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
    failed: Arc<AtomicBool>,
}

impl MicCapture {
    /// Probe input authorization once, caching the outcome
    ///
    /// Opening the default input device is the closest portable equivalent
    /// of an OS permission request: a denied microphone shows up here as a
    /// missing or unopenable device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] if the input device cannot be
    /// opened.
    pub fn authorize() -> Result<()> {
        let cached = AUTHORIZED.get_or_init(|| {
            let host = cpal::default_host();
            match host.default_input_device() {
                Some(device) => device
                    .supported_input_configs()
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                None => Err("no input device available".to_string()),
            }
        });

        cached
            .clone()
            .map_err(Error::PermissionDenied)
    }

    /// Create a capture instance for the default input device
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] if authorization fails and
    /// [`Error::DeviceUnavailable`] if no 16kHz mono input config exists.
    pub fn new() -> Result<Self> {
        Self::authorize()?;

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no input device available".to_string()))?;

        let supported = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| {
                Error::DeviceUnavailable("no mono 16kHz input config found".to_string())
            })?;

        let config = supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "microphone capture initialized"
        );

        Ok(Self {
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            failed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start capturing
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if the stream cannot be built or
    /// started.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let failed = Arc::clone(&self.failed);
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no input device".to_string()))?;

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "capture stream error");
                    failed.store(true, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;
        self.stream = Some(stream);
        self.failed.store(false, Ordering::Relaxed);

        tracing::debug!("capture started");
        Ok(())
    }

    /// Stop capturing; no-op if not running
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("capture stopped");
        }
    }

    /// Take the samples captured since the last call, clearing the buffer
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Copy the buffered samples without clearing
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.buffer.lock().map(|buf| buf.clone()).unwrap_or_default()
    }

    /// Discard buffered samples
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Whether a stream is live
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether the live stream reported a device error
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Encode f32 samples as 16-bit PCM WAV for STT uploads
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

//! Interruptible audio playback

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Poll interval while waiting for the stream to drain
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Play MP3 bytes through the default output device
///
/// Blocks until playback finishes or `stop` is set. Callers run this on a
/// dedicated thread; the cpal stream never leaves it.
///
/// # Errors
///
/// Returns error if decoding fails or the output device cannot be opened
pub fn play_mp3(data: &[u8], stop: &AtomicBool) -> Result<()> {
    let samples = decode_mp3(data)?;
    play_samples(samples, stop)
}

/// Play f32 samples through the default output device
///
/// # Errors
///
/// Returns error if the output device cannot be opened or the stream fails
pub fn play_samples(samples: Vec<f32>, stop: &AtomicBool) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let config = negotiate_output_config(&device)?;
    let channels = config.channels as usize;

    let sample_count = samples.len();
    let shared = Arc::new(Mutex::new((samples, 0usize)));
    let finished = Arc::new(AtomicBool::new(false));
    let errored = Arc::new(AtomicBool::new(false));

    let stream = {
        let shared = Arc::clone(&shared);
        let finished = Arc::clone(&finished);
        let errored = Arc::clone(&errored);

        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut guard = shared.lock().unwrap();
                    let (samples, pos) = &mut *guard;

                    for frame in data.chunks_mut(channels) {
                        let sample = if *pos < samples.len() {
                            let s = samples[*pos];
                            *pos += 1;
                            s
                        } else {
                            finished.store(true, Ordering::Relaxed);
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "playback stream error");
                    errored.store(true, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Drain with a duration-derived timeout so a wedged device can't hang us
    let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
    let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

    while !finished.load(Ordering::Relaxed) {
        if stop.load(Ordering::Relaxed) {
            tracing::debug!("playback interrupted");
            break;
        }
        if errored.load(Ordering::Relaxed) {
            drop(stream);
            return Err(Error::Audio("playback stream failed".to_string()));
        }
        if Instant::now() > deadline {
            tracing::warn!("playback drain timed out");
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    drop(stream);
    tracing::debug!(samples = sample_count, "playback finished");
    Ok(())
}

/// Find a mono (or stereo) output config at the playback rate
fn negotiate_output_config(device: &cpal::Device) -> Result<StreamConfig> {
    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
        })
        .or_else(|| {
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    Ok(supported
        .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
        .config())
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error on a corrupt stream; an empty payload decodes to an error
/// rather than silence
pub fn decode_mp3(data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() {
        return Err(Error::Audio("decoded audio was empty".to_string()));
    }

    Ok(samples)
}

//! Audio input/output
//!
//! Microphone capture, interruptible playback, and the audio-session
//! capability seam. cpal streams are not `Send`, so both capture and
//! playback confine their streams to the thread that built them.

mod capture;
mod playback;
mod session;

pub use capture::{MicCapture, SAMPLE_RATE, samples_to_wav};
pub use playback::{decode_mp3, play_mp3, play_samples};
pub use session::{AudioSessionConfigurer, DesktopSession};

//! Energy-gated utterance segmentation
//!
//! Decides when enough new speech has accumulated to be worth a
//! transcription pass: a voiced run followed by a short pause, or a long
//! uninterrupted voiced run.

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Pause after voiced audio that triggers a transcription pass
/// (in samples at 16kHz)
const PAUSE_SAMPLES: usize = 4800; // 0.3 seconds

/// Minimum new voiced audio before a pass is worthwhile
const MIN_EMIT_SAMPLES: usize = 4800; // 0.3 seconds

/// Voiced audio that forces a pass even without a pause, so long
/// utterances still produce growing partials
const MAX_EMIT_SAMPLES: usize = 48000; // 3 seconds

/// Segmentation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    /// No speech since the last emission
    Quiet,
    /// Accumulating a voiced run
    Voiced,
}

/// Accumulates utterance audio and signals when to transcribe
///
/// The segmenter never decides that an utterance is *over*; that is the
/// turn controller's silence timer. It only gates how often the remote
/// recognizer runs.
pub struct UtteranceSegmenter {
    state: GateState,
    utterance: Vec<f32>,
    pending_voiced: usize,
    silence_run: usize,
}

impl UtteranceSegmenter {
    /// Create an empty segmenter
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: GateState::Quiet,
            utterance: Vec::new(),
            pending_voiced: 0,
            silence_run: 0,
        }
    }

    /// Feed captured samples; returns true when a transcription pass is due
    pub fn push(&mut self, samples: &[f32]) -> bool {
        let energy = rms_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            GateState::Quiet => {
                if is_speech {
                    self.state = GateState::Voiced;
                    self.utterance.extend_from_slice(samples);
                    self.pending_voiced += samples.len();
                    self.silence_run = 0;
                    tracing::trace!(energy, "speech started");
                }
            }
            GateState::Voiced => {
                self.utterance.extend_from_slice(samples);

                if is_speech {
                    self.pending_voiced += samples.len();
                    self.silence_run = 0;
                } else {
                    self.silence_run += samples.len();
                }

                if self.pending_voiced >= MAX_EMIT_SAMPLES {
                    tracing::trace!(pending = self.pending_voiced, "long voiced run, pass due");
                    self.mark_emitted();
                    return true;
                }

                if self.silence_run >= PAUSE_SAMPLES && self.pending_voiced >= MIN_EMIT_SAMPLES {
                    tracing::trace!(pending = self.pending_voiced, "pause after speech, pass due");
                    self.mark_emitted();
                    return true;
                }
            }
        }

        false
    }

    /// The full utterance audio accumulated so far
    #[must_use]
    pub fn audio(&self) -> &[f32] {
        &self.utterance
    }

    /// Duration of the accumulated audio in samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.utterance.len()
    }

    /// Whether any audio has accumulated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.utterance.is_empty()
    }

    /// Discard all accumulated audio and return to quiet
    pub fn reset(&mut self) {
        self.state = GateState::Quiet;
        self.utterance.clear();
        self.pending_voiced = 0;
        self.silence_run = 0;
    }

    fn mark_emitted(&mut self) {
        self.pending_voiced = 0;
        self.silence_run = 0;
        self.state = GateState::Quiet;
    }
}

impl Default for UtteranceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

/// RMS energy of a sample window
#[allow(clippy::cast_precision_loss)]
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(duration_secs: f32, amplitude: f32) -> Vec<f32> {
        let n = (16000.0 * duration_secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / 16000.0;
                amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect()
    }

    fn silence(duration_secs: f32) -> Vec<f32> {
        vec![0.0; (16000.0 * duration_secs) as usize]
    }

    #[test]
    fn test_energy_calculation() {
        assert!(rms_energy(&silence(0.1)) < 0.001);
        assert!(rms_energy(&vec![0.5f32; 100]) > 0.4);
        assert!((rms_energy(&[]) - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_silence_never_triggers() {
        let mut seg = UtteranceSegmenter::new();
        assert!(!seg.push(&silence(1.0)));
        assert!(seg.is_empty());
    }

    #[test]
    fn test_speech_then_pause_triggers_pass() {
        let mut seg = UtteranceSegmenter::new();
        assert!(!seg.push(&tone(0.5, 0.3)));

        // Trailing pause completes the chunk
        assert!(seg.push(&silence(0.4)));
        assert!(!seg.is_empty());
    }

    #[test]
    fn test_short_blip_does_not_trigger() {
        let mut seg = UtteranceSegmenter::new();
        seg.push(&tone(0.1, 0.3));
        // Not enough voiced audio to be worth a pass
        assert!(!seg.push(&silence(0.4)));
    }

    #[test]
    fn test_long_voiced_run_forces_pass() {
        let mut seg = UtteranceSegmenter::new();
        let mut triggered = false;
        for _ in 0..8 {
            triggered |= seg.push(&tone(0.5, 0.3));
        }
        assert!(triggered);
    }

    #[test]
    fn test_audio_accumulates_across_passes() {
        let mut seg = UtteranceSegmenter::new();
        seg.push(&tone(0.5, 0.3));
        seg.push(&silence(0.4));
        let after_first = seg.len();

        seg.push(&tone(0.5, 0.3));
        assert!(seg.len() > after_first);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut seg = UtteranceSegmenter::new();
        seg.push(&tone(0.5, 0.3));
        seg.reset();
        assert!(seg.is_empty());
        assert!(!seg.push(&silence(0.4)));
    }
}

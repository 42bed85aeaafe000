//! Utterance endpointing
//!
//! Energy-based detection of where speech starts and where a single
//! utterance ends, used to close a listening session the way a
//! non-continuous recognizer does.

use std::time::Duration;

use super::capture::SAMPLE_RATE;

/// Minimum RMS energy considered speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech before an utterance may end (0.3 s at 16 kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that ends an utterance (1 s at 16 kHz)
const END_SILENCE_SAMPLES: usize = 16000;

/// Default time to wait for speech before giving up
pub const DEFAULT_NO_SPEECH_TIMEOUT: Duration = Duration::from_secs(8);

/// What the endpointer concluded after a chunk of audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// No speech heard yet
    Waiting,
    /// Inside an utterance (pauses included)
    Speaking,
    /// Speech followed by enough silence
    Complete,
    /// No speech before the timeout
    TimedOut,
}

/// Tracks one utterance across successive audio chunks
#[derive(Debug, Clone)]
pub struct Endpointer {
    heard_speech: bool,
    speech_samples: usize,
    silence_samples: usize,
    waited_samples: usize,
    no_speech_limit: usize,
}

impl Default for Endpointer {
    fn default() -> Self {
        Self::new(DEFAULT_NO_SPEECH_TIMEOUT)
    }
}

impl Endpointer {
    /// Create an endpointer giving up after `no_speech_timeout` of silence
    #[must_use]
    pub fn new(no_speech_timeout: Duration) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let no_speech_limit =
            (no_speech_timeout.as_millis() * u128::from(SAMPLE_RATE) / 1000) as usize;

        Self {
            heard_speech: false,
            speech_samples: 0,
            silence_samples: 0,
            waited_samples: 0,
            no_speech_limit,
        }
    }

    /// Feed the next chunk of 16 kHz mono audio
    pub fn process(&mut self, samples: &[f32]) -> Activity {
        let is_speech = rms(samples) > ENERGY_THRESHOLD;

        if !self.heard_speech {
            if is_speech {
                tracing::trace!("speech started");
                self.heard_speech = true;
                self.speech_samples = samples.len();
                return Activity::Speaking;
            }

            self.waited_samples += samples.len();
            if self.waited_samples >= self.no_speech_limit {
                tracing::debug!("no speech before timeout");
                return Activity::TimedOut;
            }
            return Activity::Waiting;
        }

        if is_speech {
            self.speech_samples += samples.len();
            self.silence_samples = 0;
        } else {
            self.silence_samples += samples.len();
        }

        if self.silence_samples >= END_SILENCE_SAMPLES && self.speech_samples >= MIN_SPEECH_SAMPLES {
            tracing::debug!(speech_samples = self.speech_samples, "utterance complete");
            return Activity::Complete;
        }

        Activity::Speaking
    }

    /// Whether any speech has been heard
    #[must_use]
    pub const fn heard_speech(&self) -> bool {
        self.heard_speech
    }
}

/// Root-mean-square energy of a chunk
#[must_use]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let mean = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(seconds: f32) -> Vec<f32> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = (SAMPLE_RATE as f32 * seconds) as usize;
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = i as f32 / SAMPLE_RATE as f32;
                0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect()
    }

    fn silence(seconds: f32) -> Vec<f32> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = (SAMPLE_RATE as f32 * seconds) as usize;
        vec![0.0; n]
    }

    #[test]
    fn silence_keeps_waiting() {
        let mut ep = Endpointer::default();
        assert_eq!(ep.process(&silence(0.5)), Activity::Waiting);
        assert!(!ep.heard_speech());
    }

    #[test]
    fn speech_then_silence_completes() {
        let mut ep = Endpointer::default();
        assert_eq!(ep.process(&tone(0.5)), Activity::Speaking);
        assert_eq!(ep.process(&silence(0.5)), Activity::Speaking);
        assert_eq!(ep.process(&silence(0.6)), Activity::Complete);
    }

    #[test]
    fn short_pause_does_not_end_utterance() {
        let mut ep = Endpointer::default();
        ep.process(&tone(0.5));
        assert_eq!(ep.process(&silence(0.4)), Activity::Speaking);
        assert_eq!(ep.process(&tone(0.3)), Activity::Speaking);
        assert_eq!(ep.process(&silence(0.4)), Activity::Speaking);
    }

    #[test]
    fn times_out_without_speech() {
        let mut ep = Endpointer::new(Duration::from_secs(1));
        assert_eq!(ep.process(&silence(0.5)), Activity::Waiting);
        assert_eq!(ep.process(&silence(0.5)), Activity::TimedOut);
    }

    #[test]
    fn rms_of_empty_is_zero() {
        assert!(rms(&[]).abs() < f32::EPSILON);
    }
}

//! Energy-gated utterance segmentation
//!
//! Splits a continuous microphone stream into utterances and tracks the two
//! dictation silence timeouts. Time is measured in samples so the logic does
//! not depend on wall-clock scheduling.

use std::time::Duration;

/// Minimum RMS energy to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech length to keep a segment
const MIN_SPEECH: Duration = Duration::from_millis(300);

/// Trailing silence that closes a segment
const SEGMENT_SILENCE: Duration = Duration::from_millis(500);

/// Result of feeding a chunk to the segmenter
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEvent {
    /// Nothing to report
    Pending,
    /// An utterance finished; samples include the trailing silence
    Utterance(Vec<f32>),
    /// No speech started before the relevant silence timeout
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No speech yet this session
    AwaitingFirstWord,
    /// Between utterances
    Waiting,
    /// Accumulating an utterance
    Speaking,
}

/// Splits audio into utterances
pub struct UtteranceSegmenter {
    sample_rate: u32,
    initial_silence: usize,
    auto_silence: usize,
    phase: Phase,
    buffer: Vec<f32>,
    speech_samples: usize,
    silence_samples: usize,
    heard_utterance: bool,
}

impl UtteranceSegmenter {
    /// Create a segmenter
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Rate of the incoming samples
    /// * `initial_silence` - Silence allowed before the first word
    /// * `auto_silence` - Silence allowed after the last utterance
    #[must_use]
    pub fn new(sample_rate: u32, initial_silence: Duration, auto_silence: Duration) -> Self {
        Self {
            sample_rate,
            initial_silence: samples_for(sample_rate, initial_silence),
            auto_silence: samples_for(sample_rate, auto_silence),
            phase: Phase::AwaitingFirstWord,
            buffer: Vec::new(),
            speech_samples: 0,
            silence_samples: 0,
            heard_utterance: false,
        }
    }

    /// Feed a chunk of samples
    pub fn process(&mut self, samples: &[f32]) -> SegmentEvent {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.phase {
            Phase::AwaitingFirstWord | Phase::Waiting => {
                if is_speech {
                    tracing::trace!(energy, "speech detected");
                    self.phase = Phase::Speaking;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.speech_samples = samples.len();
                    self.silence_samples = 0;
                    return SegmentEvent::Pending;
                }

                self.silence_samples += samples.len();
                let limit = if self.phase == Phase::AwaitingFirstWord {
                    self.initial_silence
                } else {
                    self.auto_silence
                };

                if self.silence_samples >= limit {
                    tracing::debug!(
                        silence_samples = self.silence_samples,
                        first_word = self.phase == Phase::AwaitingFirstWord,
                        "silence timeout"
                    );
                    return SegmentEvent::TimedOut;
                }

                SegmentEvent::Pending
            }
            Phase::Speaking => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.speech_samples += samples.len();
                    self.silence_samples = 0;
                    return SegmentEvent::Pending;
                }

                self.silence_samples += samples.len();
                if self.silence_samples < samples_for(self.sample_rate, SEGMENT_SILENCE) {
                    return SegmentEvent::Pending;
                }

                let enough_speech = self.speech_samples >= samples_for(self.sample_rate, MIN_SPEECH);
                let segment = std::mem::take(&mut self.buffer);
                self.speech_samples = 0;

                if enough_speech {
                    tracing::debug!(samples = segment.len(), "speech segment complete");
                    self.phase = Phase::Waiting;
                    self.heard_utterance = true;
                    SegmentEvent::Utterance(segment)
                } else {
                    // Too short to be speech; the silence keeps counting
                    // toward the timeout of the phase we came from
                    tracing::trace!("discarding short noise burst");
                    self.phase = if self.heard_utterance {
                        Phase::Waiting
                    } else {
                        Phase::AwaitingFirstWord
                    };
                    SegmentEvent::Pending
                }
            }
        }
    }

    /// Drop any partial utterance and restart the silence count
    ///
    /// Whether an utterance was already heard is kept, so the auto silence
    /// timeout still applies after a reset.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.speech_samples = 0;
        self.silence_samples = 0;
        self.phase = if self.heard_utterance {
            Phase::Waiting
        } else {
            Phase::AwaitingFirstWord
        };
    }
}

fn samples_for(sample_rate: u32, duration: Duration) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = (duration.as_secs_f64() * f64::from(sample_rate)) as usize;
    count
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;

    fn speech(secs: f32) -> Vec<f32> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = (RATE as f32 * secs) as usize;
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = i as f32 / RATE as f32;
                0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect()
    }

    fn silence(secs: f32) -> Vec<f32> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = (RATE as f32 * secs) as usize;
        vec![0.0; n]
    }

    fn segmenter() -> UtteranceSegmenter {
        UtteranceSegmenter::new(RATE, Duration::from_secs(8), Duration::from_secs(6))
    }

    #[test]
    fn test_energy_calculation() {
        assert!(calculate_energy(&[0.0; 100]) < 0.001);
        assert!(calculate_energy(&[0.5; 100]) > 0.4);
        assert!(calculate_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn test_utterance_after_trailing_silence() {
        let mut seg = segmenter();

        assert_eq!(seg.process(&speech(0.5)), SegmentEvent::Pending);
        assert_eq!(seg.process(&silence(0.2)), SegmentEvent::Pending);

        match seg.process(&silence(0.4)) {
            SegmentEvent::Utterance(samples) => assert_eq!(samples.len(), 17_600),
            other => panic!("expected utterance, got {other:?}"),
        }
    }

    #[test]
    fn test_initial_silence_timeout() {
        let mut seg = segmenter();

        for _ in 0..7 {
            assert_eq!(seg.process(&silence(1.0)), SegmentEvent::Pending);
        }
        assert_eq!(seg.process(&silence(1.0)), SegmentEvent::TimedOut);
    }

    #[test]
    fn test_auto_silence_timeout_after_speech() {
        let mut seg = segmenter();

        seg.process(&speech(0.5));
        assert!(matches!(seg.process(&silence(0.6)), SegmentEvent::Utterance(_)));

        // 0.6s already counted, 5.4s more reaches the 6s limit
        for _ in 0..5 {
            assert_eq!(seg.process(&silence(1.0)), SegmentEvent::Pending);
        }
        assert_eq!(seg.process(&silence(0.4)), SegmentEvent::TimedOut);
    }

    #[test]
    fn test_short_burst_discarded() {
        let mut seg = segmenter();

        seg.process(&speech(0.1));
        assert_eq!(seg.process(&silence(0.6)), SegmentEvent::Pending);
        assert_eq!(seg.process(&speech(0.5)), SegmentEvent::Pending);
        assert!(matches!(seg.process(&silence(0.6)), SegmentEvent::Utterance(_)));
    }

    #[test]
    fn test_reset_drops_partial_utterance() {
        let mut seg = segmenter();

        assert_eq!(seg.process(&speech(1.0)), SegmentEvent::Pending);
        seg.reset();
        assert_eq!(seg.process(&silence(0.6)), SegmentEvent::Pending);
    }

    #[test]
    fn test_reset_keeps_auto_silence_after_utterance() {
        let mut seg = segmenter();

        seg.process(&speech(0.5));
        assert!(matches!(seg.process(&silence(0.6)), SegmentEvent::Utterance(_)));

        for _ in 0..5 {
            seg.process(&silence(1.0));
        }
        seg.reset();

        // The count starts over, but against the 6s auto limit
        for _ in 0..5 {
            assert_eq!(seg.process(&silence(1.0)), SegmentEvent::Pending);
        }
        assert_eq!(seg.process(&silence(1.0)), SegmentEvent::TimedOut);
    }
}

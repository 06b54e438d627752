//! Energy-based utterance segmentation
//!
//! Finds where speech starts in the microphone stream and where trailing
//! silence ends it.

use crate::voice::SAMPLE_RATE;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to count as an utterance (0.3 seconds)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Silence duration that ends an utterance (0.5 seconds)
const SILENCE_SAMPLES: usize = 8000;

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Waiting,
    /// Speech detected, accumulating
    Speaking,
    /// Enough speech followed by enough silence
    Complete,
}

/// Segments one utterance out of a stream of audio chunks
#[derive(Debug)]
pub struct UtteranceDetector {
    state: DetectorState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceDetector {
    /// Create a detector waiting for speech
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DetectorState::Waiting,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Feed a chunk of samples and return the resulting state
    pub fn process(&mut self, samples: &[f32]) -> DetectorState {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            DetectorState::Waiting => {
                if is_speech {
                    self.state = DetectorState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected");
                }
            }
            DetectorState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > SILENCE_SAMPLES {
                    if self.speech_buffer.len() > MIN_SPEECH_SAMPLES + self.silence_counter {
                        tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                        self.state = DetectorState::Complete;
                    } else {
                        // a click or cough, not speech
                        tracing::trace!("speech too short, waiting again");
                        self.reset();
                    }
                }
            }
            DetectorState::Complete => {}
        }

        self.state
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Seconds of audio accumulated since speech started
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn speech_secs(&self) -> f32 {
        self.speech_buffer.len() as f32 / SAMPLE_RATE as f32
    }

    /// Take the utterance, leaving the detector waiting
    ///
    /// Returns an empty buffer if speech never started.
    pub fn take_speech(&mut self) -> Vec<f32> {
        let speech = match self.state {
            DetectorState::Waiting => Vec::new(),
            DetectorState::Speaking | DetectorState::Complete => {
                std::mem::take(&mut self.speech_buffer)
            }
        };
        self.reset();
        speech
    }

    /// Reset to waiting
    pub fn reset(&mut self) {
        self.state = DetectorState::Waiting;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }
}

/// RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

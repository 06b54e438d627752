//! Audio devices and cloud speech backends
//!
//! Microphone recording, speaker playback, and the STT/TTS HTTP clients the
//! capture adapter and the speaker renderer are built from.

mod playback;
mod recorder;
mod speaker;
mod stt;
mod tts;

pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, decode_mp3};
pub use recorder::{AudioRecorder, SAMPLE_RATE, samples_to_wav};
pub use speaker::SpeakerRenderer;
pub use stt::{SpeechToText, SttProvider};
pub use tts::TextToSpeech;

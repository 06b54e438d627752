//! Speaker output for reply feedback

use async_trait::async_trait;

use super::{AudioPlayback, TextToSpeech};
use crate::feedback::AudioRenderer;
use crate::{Error, Result};

/// Plays reply audio on the default output device
///
/// Speech synthesis needs a TTS backend; without one `speak` fails and the
/// coordinator logs the miss.
pub struct SpeakerRenderer {
    playback: AudioPlayback,
    tts: Option<TextToSpeech>,
}

impl SpeakerRenderer {
    /// Create a renderer around an opened output device
    #[must_use]
    pub const fn new(playback: AudioPlayback, tts: Option<TextToSpeech>) -> Self {
        Self { playback, tts }
    }
}

#[async_trait]
impl AudioRenderer for SpeakerRenderer {
    async fn play_encoded_audio(&self, bytes: Vec<u8>) -> Result<()> {
        self.playback.play_mp3(&bytes).await
    }

    async fn speak(&self, text: &str) -> Result<()> {
        let tts = self
            .tts
            .as_ref()
            .ok_or_else(|| Error::Playback("no speech synthesizer configured".to_string()))?;

        let mp3 = tts.synthesize(text).await?;
        self.playback.play_mp3(&mp3).await
    }

    fn stop(&self) {
        self.playback.cancel();
    }
}

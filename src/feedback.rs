//! Audio feedback for interpreter replies
//!
//! At most one playback is active. Presenting a new reply cancels whatever
//! is still playing; feedback is never queued.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::interpreter::InterpreterReply;
use crate::{Error, Result};

/// Platform audio output
#[async_trait]
pub trait AudioRenderer: Send + Sync {
    /// Play encoded (MP3) audio to completion
    ///
    /// # Errors
    ///
    /// Returns error if the audio cannot be decoded or played
    async fn play_encoded_audio(&self, bytes: Vec<u8>) -> Result<()>;

    /// Synthesize `text` as speech and play it
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    async fn speak(&self, text: &str) -> Result<()>;

    /// Cut off any audio currently playing
    fn stop(&self) {}
}

/// Renderer that produces no sound
///
/// Used when audio is disabled; the UI shows the message instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentRenderer;

#[async_trait]
impl AudioRenderer for SilentRenderer {
    async fn play_encoded_audio(&self, bytes: Vec<u8>) -> Result<()> {
        tracing::debug!(bytes = bytes.len(), "audio muted");
        Ok(())
    }

    async fn speak(&self, text: &str) -> Result<()> {
        tracing::debug!(text, "speech muted");
        Ok(())
    }
}

/// Decides how to voice a reply and owns the single playback slot
pub struct FeedbackCoordinator {
    renderer: Arc<dyn AudioRenderer>,
    active: Mutex<Option<Playback>>,
}

/// Running playback task
struct Playback {
    handle: JoinHandle<()>,
    /// Closes when the task finishes or is aborted
    done: watch::Receiver<()>,
}

impl FeedbackCoordinator {
    /// Create a coordinator rendering through `renderer`
    #[must_use]
    pub fn new(renderer: Arc<dyn AudioRenderer>) -> Self {
        Self {
            renderer,
            active: Mutex::new(None),
        }
    }

    /// Voice `reply` without waiting for playback to finish
    ///
    /// Plays the reply's audio payload when present, falling back to
    /// synthesizing the message if the payload cannot be decoded or played.
    /// Must be called from within a Tokio runtime.
    pub fn present(&self, reply: &InterpreterReply) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = active.take() {
            if !previous.handle.is_finished() {
                tracing::debug!("cancelling previous playback");
                previous.handle.abort();
                self.renderer.stop();
            }
        }

        let renderer = Arc::clone(&self.renderer);
        let audio = reply.audio_payload.clone();
        let message = reply.message.clone();
        let (done_tx, done) = watch::channel(());

        let handle = tokio::spawn(async move {
            let _done = done_tx;
            render(renderer.as_ref(), audio.as_deref(), &message).await;
        });
        *active = Some(Playback { handle, done });
    }

    /// Cancel the active playback, if any
    pub fn cancel(&self) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(previous) = previous {
            previous.handle.abort();
            self.renderer.stop();
        }
    }

    /// Wait until the active playback finishes or is cancelled
    ///
    /// The playback stays in its slot while waiting, so a concurrent
    /// [`present`](Self::present) still cancels it.
    pub async fn wait_idle(&self) {
        let done = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|p| p.done.clone());

        if let Some(mut done) = done {
            // never sent on; resolves once the task drops its sender
            let _ = done.changed().await;
        }
    }
}

async fn render(renderer: &dyn AudioRenderer, audio: Option<&str>, message: &str) {
    if let Some(encoded) = audio {
        match decode_audio(encoded) {
            Ok(bytes) => match renderer.play_encoded_audio(bytes).await {
                Ok(()) => return,
                Err(e) => tracing::warn!(error = %e, "audio playback failed, speaking message"),
            },
            Err(e) => tracing::warn!(error = %e, "audio payload undecodable, speaking message"),
        }
    }

    if message.trim().is_empty() {
        return;
    }

    if let Err(e) = renderer.speak(message).await {
        tracing::warn!(error = %e, "speech synthesis failed");
    }
}

/// Decode a base64 audio payload, tolerating a `data:` URL prefix
fn decode_audio(encoded: &str) -> Result<Vec<u8>> {
    let payload = encoded
        .split_once(";base64,")
        .map_or(encoded, |(_, data)| data)
        .trim();

    STANDARD
        .decode(payload)
        .map_err(|e| Error::Playback(format!("invalid audio payload: {e}")))
}

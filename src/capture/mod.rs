//! Speech capture adapters
//!
//! An adapter turns speech into transcript events tagged with the capture
//! session id the session controller handed it at `start`.

mod microphone;
mod utterance;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use microphone::{CaptureLimits, MicrophoneCapture};
pub use utterance::{DetectorState, UtteranceDetector, calculate_energy};

use crate::Result;
use crate::transcript::CaptureSessionId;

/// Channel an adapter pushes its events into
pub type CaptureSink = mpsc::UnboundedSender<CaptureEvent>;

/// What happened in a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEventKind {
    /// In-progress text, may still change
    Interim(String),
    /// Finalized text for the utterance
    Final(String),
    /// Recognition engine failure
    Error(String),
    /// Capture finished; no more events follow
    Ended,
}

/// Event emitted by a capture adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    /// Session the event belongs to
    pub session: CaptureSessionId,
    /// Payload
    pub kind: CaptureEventKind,
}

impl CaptureEvent {
    /// Interim text event
    #[must_use]
    pub fn interim(session: CaptureSessionId, text: impl Into<String>) -> Self {
        Self {
            session,
            kind: CaptureEventKind::Interim(text.into()),
        }
    }

    /// Final text event
    #[must_use]
    pub fn final_text(session: CaptureSessionId, text: impl Into<String>) -> Self {
        Self {
            session,
            kind: CaptureEventKind::Final(text.into()),
        }
    }

    /// Recognition failure event
    #[must_use]
    pub fn error(session: CaptureSessionId, message: impl Into<String>) -> Self {
        Self {
            session,
            kind: CaptureEventKind::Error(message.into()),
        }
    }

    /// End-of-capture event
    #[must_use]
    pub const fn ended(session: CaptureSessionId) -> Self {
        Self {
            session,
            kind: CaptureEventKind::Ended,
        }
    }
}

/// Platform speech-to-text engine
#[async_trait]
pub trait SpeechCapture: Send + Sync {
    /// Whether capture can be attempted at all
    fn is_available(&self) -> bool;

    /// Begin capturing for `session`, pushing events into `events`
    ///
    /// Resolves once the engine has acknowledged the start. Starting while a
    /// previous session is active supersedes it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CaptureUnavailable`] or a capture error if the
    /// engine cannot start
    async fn start(&self, session: CaptureSessionId, events: CaptureSink) -> Result<()>;

    /// Stop the active session
    ///
    /// The engine may still flush a final result for the stopped session.
    ///
    /// # Errors
    ///
    /// Returns a capture error if the engine fails to stop cleanly
    async fn stop(&self) -> Result<()>;
}

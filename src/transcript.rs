//! Transcript buffer fed by speech capture and manual edits
//!
//! Every capture session gets a monotonically increasing id. Events tagged
//! with any other id are dropped, so a late interim result can never
//! overwrite text the user typed or a newer capture.

use std::fmt;

/// Identifier of one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaptureSessionId(u64);

impl CaptureSessionId {
    /// Raw counter value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CaptureSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Latest spoken or typed text for the session
#[derive(Debug, Default)]
pub struct TranscriptBuffer {
    text: String,
    /// Text to fall back to when interim results are discarded
    committed: String,
    interim: bool,
    ready: bool,
    current: Option<CaptureSessionId>,
    /// Current session was stopped; only its final result may still land
    stopped: bool,
    issued: u64,
}

impl TranscriptBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new capture session, superseding any previous one
    pub fn begin_capture(&mut self) -> CaptureSessionId {
        self.issued += 1;
        let id = CaptureSessionId(self.issued);
        self.current = Some(id);
        self.committed.clone_from(&self.text);
        self.interim = false;
        self.stopped = false;
        tracing::trace!(session = %id, "capture session started");
        id
    }

    /// Replace the displayed value with in-progress text
    ///
    /// Returns `false` if the event belongs to a stale or stopped session.
    pub fn on_interim(&mut self, session: CaptureSessionId, text: &str) -> bool {
        if !self.is_current(session) || self.stopped {
            tracing::trace!(session = %session, "dropping stale interim result");
            return false;
        }
        self.text = text.to_string();
        self.interim = true;
        self.ready = false;
        true
    }

    /// Replace the buffer with finalized text and mark it submit-ready
    ///
    /// Returns `false` if the event belongs to a stale session.
    pub fn on_final(&mut self, session: CaptureSessionId, text: &str) -> bool {
        if !self.is_current(session) {
            tracing::trace!(session = %session, "dropping stale final result");
            return false;
        }
        self.text = text.to_string();
        self.committed = self.text.clone();
        self.interim = false;
        self.ready = true;
        true
    }

    /// Stop a capture session, discarding its interim text
    ///
    /// The session stays current so a final result the engine flushes after
    /// stopping still lands; later interim results are dropped. Returns
    /// `false` for a stale session.
    pub fn end_capture(&mut self, session: CaptureSessionId) -> bool {
        if !self.is_current(session) {
            return false;
        }
        self.stopped = true;
        if self.interim {
            tracing::trace!(session = %session, "discarding interim text");
            self.text.clone_from(&self.committed);
            self.interim = false;
            self.ready = !self.committed.is_empty();
        }
        true
    }

    /// Manual edit; invalidates the current capture session
    pub fn edit(&mut self, text: &str) {
        self.current = None;
        self.stopped = false;
        self.text = text.to_string();
        self.committed = self.text.clone();
        self.interim = false;
        self.ready = true;
    }

    /// Empty the buffer and forget the current session
    pub fn clear(&mut self) {
        self.text.clear();
        self.committed.clear();
        self.interim = false;
        self.ready = false;
        self.current = None;
        self.stopped = false;
    }

    /// Current displayed value
    #[must_use]
    pub fn snapshot(&self) -> &str {
        &self.text
    }

    /// Whether the text was finalized or typed and is non-blank
    #[must_use]
    pub fn is_submit_ready(&self) -> bool {
        self.ready && !self.text.trim().is_empty()
    }

    /// Whether the displayed value is still in progress
    #[must_use]
    pub const fn is_interim(&self) -> bool {
        self.interim
    }

    /// Session whose events are currently accepted
    #[must_use]
    pub const fn current_session(&self) -> Option<CaptureSessionId> {
        self.current
    }

    fn is_current(&self, session: CaptureSessionId) -> bool {
        self.current == Some(session)
    }
}

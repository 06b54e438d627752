//! Session controller
//!
//! Owns the cart, transcript and transaction tracker for one till, and runs
//! the capture → dispatch → reconcile → record → present cycle.
//!
//! ```text
//!   start_capture ──► CaptureHandle ──► apply_capture_event ──► transcript
//!                                                                   │
//!   submit ──► Dispatcher ──► reconcile ──► tracker ──► feedback    │
//!     ▲                                                             │
//!     └─────────────────────── snapshot ◄───────────────────────────┘
//! ```
//!
//! All methods take `&self`; state sits behind a mutex that is never held
//! across an await, so a second `submit` issued while one is in flight is
//! observed as [`Error::Busy`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::billing::BillingClient;
use crate::capture::{CaptureEvent, CaptureEventKind, SpeechCapture};
use crate::cart::{Cart, reconcile};
use crate::dashboard::{DashboardClient, DashboardSnapshot};
use crate::feedback::{AudioRenderer, FeedbackCoordinator};
use crate::interpreter::{ActionType, Dispatcher};
use crate::transaction::{TransactionId, TransactionTracker};
use crate::transcript::{CaptureSessionId, TranscriptBuffer};
use crate::{Error, Result};

/// Controller state as seen by a UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for capture or submit
    Idle,
    /// A capture session is active
    Listening,
    /// A command is awaiting the interpreter
    Dispatching,
}

/// Result of a successfully applied reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Action the interpreter chose
    pub action: ActionType,
    /// Interpreter's message
    pub message: String,
    /// Bill id recorded by this reply, if it was a billed checkout
    pub transaction_id: Option<TransactionId>,
}

/// Event stream for one capture session
#[derive(Debug)]
pub struct CaptureHandle {
    /// Id the adapter tags its events with
    pub session: CaptureSessionId,
    /// Events pushed by the adapter
    pub events: mpsc::UnboundedReceiver<CaptureEvent>,
}

#[derive(Debug, Default)]
struct Session {
    cart: Cart,
    transcript: TranscriptBuffer,
    tracker: TransactionTracker,
    listening: Option<CaptureSessionId>,
    dispatching: bool,
    /// Bumped on reset; replies dispatched under an older epoch are stale
    epoch: u64,
    message: Option<String>,
    notice: Option<String>,
    dashboard: Option<DashboardSnapshot>,
}

/// Top-level orchestrator for one billing session
pub struct SessionController {
    dispatcher: Dispatcher,
    feedback: FeedbackCoordinator,
    capture: Option<Arc<dyn SpeechCapture>>,
    dashboard: Option<DashboardClient>,
    billing: Option<BillingClient>,
    state: Mutex<Session>,
}

/// Clears the dispatching flag however the submit future ends
struct InFlight<'a> {
    state: &'a Mutex<Session>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dispatching = false;
    }
}

impl SessionController {
    /// Create a controller with an empty cart and no capture adapter
    #[must_use]
    pub fn new(dispatcher: Dispatcher, renderer: Arc<dyn AudioRenderer>) -> Self {
        Self {
            dispatcher,
            feedback: FeedbackCoordinator::new(renderer),
            capture: None,
            dashboard: None,
            billing: None,
            state: Mutex::new(Session::default()),
        }
    }

    /// Attach a speech capture adapter
    #[must_use]
    pub fn with_capture(mut self, capture: Arc<dyn SpeechCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Refresh dashboard data after every applied reply
    #[must_use]
    pub fn with_dashboard(mut self, dashboard: DashboardClient) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    /// Attach the billing artifact store
    #[must_use]
    pub fn with_billing(mut self, billing: BillingClient) -> Self {
        self.billing = Some(billing);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- capture ----

    /// Whether a capture adapter exists and reports itself usable
    #[must_use]
    pub fn capture_available(&self) -> bool {
        self.capture.as_ref().is_some_and(|c| c.is_available())
    }

    /// Begin a capture session
    ///
    /// Allowed while a command is dispatching. Starting while already
    /// listening supersedes the previous session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureUnavailable`] if no usable adapter exists, or
    /// the adapter's error if it fails to start. State is left unchanged.
    pub async fn start_capture(&self) -> Result<CaptureHandle> {
        let Some(capture) = self.capture.as_ref().filter(|c| c.is_available()) else {
            self.lock().notice = Some(Error::CaptureUnavailable.to_string());
            return Err(Error::CaptureUnavailable);
        };

        let session = {
            let mut s = self.lock();
            let session = s.transcript.begin_capture();
            s.listening = Some(session);
            session
        };

        let (tx, events) = mpsc::unbounded_channel();
        if let Err(e) = capture.start(session, tx).await {
            tracing::warn!(session = %session, error = %e, "capture failed to start");
            let mut s = self.lock();
            if s.listening == Some(session) {
                s.listening = None;
            }
            s.notice = Some(e.to_string());
            return Err(e);
        }

        Ok(CaptureHandle { session, events })
    }

    /// Feed one adapter event into the transcript
    ///
    /// Returns `Ok(false)` when the event belongs to a superseded session and
    /// was dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] for a recognition failure on the current
    /// session; the session returns to idle.
    pub fn apply_capture_event(&self, event: CaptureEvent) -> Result<bool> {
        let CaptureEvent { session, kind } = event;
        let mut s = self.lock();

        match kind {
            CaptureEventKind::Interim(text) => Ok(s.transcript.on_interim(session, &text)),
            CaptureEventKind::Final(text) => {
                let applied = s.transcript.on_final(session, &text);
                if applied && s.listening == Some(session) {
                    s.listening = None;
                }
                Ok(applied)
            }
            CaptureEventKind::Error(message) => {
                if s.transcript.current_session() != Some(session) {
                    return Ok(false);
                }
                s.transcript.end_capture(session);
                if s.listening == Some(session) {
                    s.listening = None;
                }
                s.notice = Some(message.clone());
                Err(Error::Capture(message))
            }
            CaptureEventKind::Ended => {
                if s.listening != Some(session) {
                    return Ok(false);
                }
                s.transcript.end_capture(session);
                s.listening = None;
                Ok(true)
            }
        }
    }

    /// Drain a capture session's events until it ends
    ///
    /// Returns the final transcript if one landed for this session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] if the engine reported a failure
    pub async fn follow_capture(&self, mut handle: CaptureHandle) -> Result<Option<String>> {
        let mut final_text = None;

        while let Some(event) = handle.events.recv().await {
            let ended = event.session == handle.session && event.kind == CaptureEventKind::Ended;
            let text = match &event.kind {
                CaptureEventKind::Final(text) => Some(text.clone()),
                _ => None,
            };

            if self.apply_capture_event(event)? {
                if let Some(text) = text {
                    final_text = Some(text);
                }
            }
            if ended {
                break;
            }
        }

        Ok(final_text)
    }

    /// Stop the active capture session, discarding its interim text
    ///
    /// # Errors
    ///
    /// Returns the adapter's error if it fails to stop
    pub async fn stop_capture(&self) -> Result<()> {
        let stopped = {
            let mut s = self.lock();
            let stopped = s.listening.take();
            if let Some(session) = stopped {
                s.transcript.end_capture(session);
            }
            stopped
        };

        if let (Some(session), Some(capture)) = (stopped, self.capture.as_ref()) {
            tracing::debug!(session = %session, "stopping capture");
            capture.stop().await?;
        }
        Ok(())
    }

    /// Replace the transcript with typed text
    ///
    /// Late events from the capture session that was active are dropped.
    pub fn edit_transcript(&self, text: &str) {
        let mut s = self.lock();
        s.transcript.edit(text);
        s.listening = None;
    }

    // ---- dispatch ----

    /// Send the current transcript and apply the reply
    ///
    /// The buffer's value at call time is the snapshot sent, even if a capture
    /// session is still producing interim text. A blank transcript is a
    /// no-op and yields `Ok(None)`.
    ///
    /// On success the cart is reconciled and the transaction recorded before
    /// feedback is presented.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if a dispatch is already in flight
    /// - [`Error::Dispatch`] if the round trip fails; cart and transaction are
    ///   unchanged
    /// - [`Error::StaleReply`] if the session was reset while waiting
    /// - [`Error::Reconciliation`] if the delta is malformed; the cart is
    ///   unchanged but the reply's message is still presented
    pub async fn submit(&self) -> Result<Option<SubmitOutcome>> {
        let (text, cart, epoch) = {
            let mut s = self.lock();
            if s.dispatching {
                tracing::debug!("submit rejected, dispatch in flight");
                return Err(Error::Busy);
            }
            let text = s.transcript.snapshot().trim().to_string();
            if text.is_empty() {
                return Ok(None);
            }
            s.dispatching = true;
            (text, s.cart.clone(), s.epoch)
        };
        let in_flight = InFlight { state: &self.state };

        let result = self.dispatcher.dispatch(&text, &cart).await;

        let (reply, outcome) = {
            let mut s = self.lock();
            if s.epoch != epoch {
                tracing::info!("session reset during dispatch, discarding reply");
                return Err(Error::StaleReply);
            }

            let reply = match result {
                Ok(Some(reply)) => reply,
                Ok(None) => return Ok(None),
                Err(e) => {
                    tracing::warn!(error = %e, "dispatch failed");
                    s.notice = Some(e.to_string());
                    return Err(e.into());
                }
            };

            s.message = Some(reply.message.clone());

            let next = match reconcile(&s.cart, &reply) {
                Ok(next) => next,
                Err(e) => {
                    tracing::warn!(error = %e, action = %reply.action, "reply not applied");
                    s.notice = Some(e.to_string());
                    drop(s);
                    self.feedback.present(&reply);
                    return Err(e.into());
                }
            };

            s.cart = next;
            let recorded = s.tracker.observe(&reply);
            s.notice = None;

            let outcome = SubmitOutcome {
                action: reply.action,
                message: reply.message.clone(),
                transaction_id: if recorded { s.tracker.current().cloned() } else { None },
            };
            tracing::debug!(
                action = %outcome.action,
                lines = s.cart.len(),
                total = %s.cart.grand_total(),
                "reply applied"
            );
            (reply, outcome)
        };

        self.feedback.present(&reply);
        drop(in_flight);

        if self.dashboard.is_some() {
            self.refresh_dashboard().await;
        }

        Ok(Some(outcome))
    }

    /// Type `text` and submit it in one step
    ///
    /// # Errors
    ///
    /// Same as [`Self::submit`]
    pub async fn submit_text(&self, text: &str) -> Result<Option<SubmitOutcome>> {
        {
            let s = self.lock();
            if s.dispatching {
                return Err(Error::Busy);
            }
        }
        self.edit_transcript(text);
        self.submit().await
    }

    /// Empty the cart, transcript and transaction
    ///
    /// Any reply still in flight is discarded when it arrives, and active
    /// playback and capture are stopped.
    pub async fn reset(&self) {
        let listening = {
            let mut s = self.lock();
            s.cart = Cart::new();
            s.transcript.clear();
            s.tracker.clear();
            s.epoch += 1;
            s.message = None;
            s.notice = None;
            s.listening.take()
        };

        self.feedback.cancel();

        if let (Some(_), Some(capture)) = (listening, self.capture.as_ref()) {
            if let Err(e) = capture.stop().await {
                tracing::warn!(error = %e, "failed to stop capture on reset");
            }
        }

        tracing::info!("session reset");
    }

    // ---- bills and dashboard ----

    /// URL of the last recorded bill
    #[must_use]
    pub fn bill_url(&self) -> Option<String> {
        let id = self.last_transaction()?;
        let url = self.billing.as_ref()?.bill_url(&id).ok()?;
        Some(url.into())
    }

    /// Download the last recorded bill
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoBill`] if no checkout has produced a bill, or the
    /// billing store's error
    pub async fn download_bill(&self) -> Result<(TransactionId, Vec<u8>)> {
        let id = self.last_transaction().ok_or(Error::NoBill)?;
        let billing = self
            .billing
            .as_ref()
            .ok_or_else(|| Error::Config("no billing store configured".to_string()))?;

        let bytes = billing.download(&id).await?;
        Ok((id, bytes))
    }

    /// Fetch fresh dashboard data and keep it as the latest snapshot
    ///
    /// Returns `None` if no dashboard client is attached.
    pub async fn refresh_dashboard(&self) -> Option<DashboardSnapshot> {
        let snapshot = self.dashboard.as_ref()?.refresh().await;
        self.lock().dashboard = Some(snapshot.clone());
        Some(snapshot)
    }

    // ---- accessors ----

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        let s = self.lock();
        if s.dispatching {
            SessionState::Dispatching
        } else if s.listening.is_some() {
            SessionState::Listening
        } else {
            SessionState::Idle
        }
    }

    /// Whether a capture session is active
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.lock().listening.is_some()
    }

    /// Copy of the current cart
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.lock().cart.clone()
    }

    /// Current transcript text
    #[must_use]
    pub fn transcript(&self) -> String {
        self.lock().transcript.snapshot().to_string()
    }

    /// Whether the transcript is finalized or typed and non-blank
    #[must_use]
    pub fn is_submit_ready(&self) -> bool {
        self.lock().transcript.is_submit_ready()
    }

    /// Last recorded bill id
    #[must_use]
    pub fn last_transaction(&self) -> Option<TransactionId> {
        self.lock().tracker.current().cloned()
    }

    /// Message of the last reply
    #[must_use]
    pub fn message(&self) -> Option<String> {
        self.lock().message.clone()
    }

    /// Error notice from the last failed operation
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        self.lock().notice.clone()
    }

    /// Latest dashboard snapshot
    #[must_use]
    pub fn dashboard(&self) -> Option<DashboardSnapshot> {
        self.lock().dashboard.clone()
    }

    /// Feedback coordinator, for waiting on playback
    #[must_use]
    pub const fn feedback(&self) -> &FeedbackCoordinator {
        &self.feedback
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::feedback::SilentRenderer;
    use crate::interpreter::{CommandInterpreter, CommandRequest, CommandResponse};
    use crate::error::DispatchError;

    struct Unreachable;

    #[async_trait]
    impl CommandInterpreter for Unreachable {
        async fn interpret(&self, _: &CommandRequest) -> std::result::Result<CommandResponse, DispatchError> {
            Err(DispatchError::Malformed("unreachable".to_string()))
        }
    }

    fn controller() -> SessionController {
        SessionController::new(
            Dispatcher::new(Arc::new(Unreachable)),
            Arc::new(SilentRenderer),
        )
    }

    #[tokio::test]
    async fn test_blank_submit_is_noop() {
        let session = controller();
        session.edit_transcript("   ");

        assert!(session.submit().await.unwrap().is_none());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.notice().is_none());
    }

    #[tokio::test]
    async fn test_start_capture_without_adapter() {
        let session = controller();

        let result = session.start_capture().await;
        assert!(matches!(result, Err(Error::CaptureUnavailable)));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.notice().is_some());
    }

    #[tokio::test]
    async fn test_download_bill_before_checkout() {
        let session = controller();
        assert!(matches!(session.download_bill().await, Err(Error::NoBill)));
        assert!(session.bill_url().is_none());
    }

    #[tokio::test]
    async fn test_failed_dispatch_returns_to_idle() {
        let session = controller();
        session.edit_transcript("add two Maggi");

        assert!(matches!(session.submit().await, Err(Error::Dispatch(_))));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.transcript(), "add two Maggi");
    }
}

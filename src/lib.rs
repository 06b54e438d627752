//! voicebill - Voice-driven point-of-sale session
//!
//! This library turns spoken retail commands into a consistent cart and a
//! billable transaction:
//! - Speech capture with per-session ids so stale results never land
//! - Command dispatch to a remote interpreter with a bounded wait
//! - Pure cart reconciliation (add / remove / checkout / none)
//! - Latest-wins audio feedback with speech synthesis fallback
//! - Bill retrieval and dashboard refresh
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Front ends                        │
//! │        CLI REPL   │   one-shot commands              │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Session Controller                    │
//! │ Transcript │ Dispatcher │ Reconcile │ Tracker │ Feedback │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 External services                    │
//! │  Microphone/STT │ Interpreter │ Speaker/TTS │ Billing │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod billing;
pub mod capture;
pub mod cart;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod feedback;
pub mod interpreter;
pub mod session;
pub mod transaction;
pub mod transcript;
pub mod voice;

pub use billing::BillingClient;
pub use capture::{CaptureEvent, CaptureEventKind, MicrophoneCapture, SpeechCapture};
pub use cart::{Cart, CartLine, DeltaLine, ProductId, reconcile};
pub use config::Config;
pub use dashboard::{DashboardClient, DashboardSnapshot};
pub use error::{DispatchError, Error, ReconciliationError, Result};
pub use feedback::{AudioRenderer, FeedbackCoordinator, SilentRenderer};
pub use interpreter::{ActionType, CommandInterpreter, Dispatcher, HttpInterpreter, InterpreterReply};
pub use session::{CaptureHandle, SessionController, SessionState, SubmitOutcome};
pub use transaction::{TransactionId, TransactionTracker};
pub use transcript::{CaptureSessionId, TranscriptBuffer};

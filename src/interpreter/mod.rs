//! Command interpreter dispatch
//!
//! Sends a transcript plus a reduced cart snapshot to the remote interpreter
//! and turns its reply into a typed [`InterpreterReply`]. Dispatch never
//! touches session state; the caller applies the reply.

mod http;
mod wire;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use http::HttpInterpreter;
pub use wire::{CommandRequest, CommandResponse};

use crate::cart::{Cart, DeltaLine};
use crate::error::DispatchError;
use crate::transaction::TransactionId;

/// Default request timeout for one interpreter round trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Action the interpreter asks the session to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Merge delta lines into the cart
    Add,
    /// Drop the lines whose ids the delta names
    Remove,
    /// Empty the cart; may carry a transaction id
    Checkout,
    /// Change nothing (clarification, info, error, or an unknown action)
    None,
}

impl ActionType {
    /// Map a wire `action_type` value, treating anything unknown as `None`
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "add" => Self::Add,
            "remove" => Self::Remove,
            "checkout" => Self::Checkout,
            other => {
                tracing::debug!(action_type = other, "unrecognized action type, treating as none");
                Self::None
            }
        }
    }

    /// Wire spelling of the action
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Checkout => "checkout",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-formed result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterReply {
    /// What to do with the cart
    pub action: ActionType,
    /// Lines relevant to the action, in reply order
    pub delta: Vec<DeltaLine>,
    /// Human-readable text, always present
    pub message: String,
    /// Base64-encoded audio; preferred over synthesizing `message`
    pub audio_payload: Option<String>,
    /// Bill identifier, only meaningful on a successful checkout
    pub transaction_id: Option<TransactionId>,
}

impl InterpreterReply {
    /// Reply that changes nothing and only carries a message
    #[must_use]
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            action: ActionType::None,
            delta: Vec::new(),
            message: message.into(),
            audio_payload: None,
            transaction_id: None,
        }
    }
}

/// Remote service that interprets a spoken command
#[async_trait]
pub trait CommandInterpreter: Send + Sync {
    /// Perform one round trip
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] on transport failure, non-success status, or
    /// an unparseable body.
    async fn interpret(&self, request: &CommandRequest) -> Result<CommandResponse, DispatchError>;
}

/// Sends transcripts to an interpreter with a bounded wait
#[derive(Clone)]
pub struct Dispatcher {
    interpreter: Arc<dyn CommandInterpreter>,
    timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher with the default timeout
    #[must_use]
    pub fn new(interpreter: Arc<dyn CommandInterpreter>) -> Self {
        Self::with_timeout(interpreter, DEFAULT_TIMEOUT)
    }

    /// Create a dispatcher with an explicit request timeout
    #[must_use]
    pub fn with_timeout(interpreter: Arc<dyn CommandInterpreter>, timeout: Duration) -> Self {
        Self {
            interpreter,
            timeout,
        }
    }

    /// Configured request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `transcript` with the cart's `{product_id, quantity}` context
    ///
    /// A blank transcript is a no-op and yields `Ok(None)` without a network
    /// call.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the round trip fails, times out, or the
    /// reply lacks `action_type` or `message`.
    pub async fn dispatch(
        &self,
        transcript: &str,
        cart: &Cart,
    ) -> Result<Option<InterpreterReply>, DispatchError> {
        let text = transcript.trim();
        if text.is_empty() {
            tracing::debug!("empty transcript, nothing to dispatch");
            return Ok(None);
        }

        let request = CommandRequest {
            text: text.to_string(),
            cart_context: cart.context(),
        };

        tracing::debug!(text, context_lines = request.cart_context.len(), "dispatching command");

        let response = tokio::time::timeout(self.timeout, self.interpreter.interpret(&request))
            .await
            .map_err(|_| {
                tracing::warn!(timeout = ?self.timeout, "interpreter timed out");
                DispatchError::Timeout(self.timeout)
            })??;

        let reply = InterpreterReply::try_from(response)?;
        tracing::info!(action = %reply.action, message = %reply.message, "interpreter replied");

        Ok(Some(reply))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rust_decimal::Decimal;

    use super::*;
    use crate::cart::{CartLine, ProductId};

    /// Records requests and answers with a canned response
    struct Canned {
        response: fn() -> Result<CommandResponse, DispatchError>,
        delay: Duration,
        seen: Mutex<Vec<CommandRequest>>,
    }

    #[async_trait]
    impl CommandInterpreter for Canned {
        async fn interpret(&self, request: &CommandRequest) -> Result<CommandResponse, DispatchError> {
            self.seen.lock().unwrap().push(request.clone());
            tokio::time::sleep(self.delay).await;
            (self.response)()
        }
    }

    fn canned(response: fn() -> Result<CommandResponse, DispatchError>) -> Arc<Canned> {
        Arc::new(Canned {
            response,
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn ok_none() -> Result<CommandResponse, DispatchError> {
        Ok(serde_json::from_str(r#"{"message": "ok", "action_type": "none"}"#).unwrap())
    }

    #[test]
    fn test_action_type_from_wire() {
        assert_eq!(ActionType::from_wire("add"), ActionType::Add);
        assert_eq!(ActionType::from_wire("remove"), ActionType::Remove);
        assert_eq!(ActionType::from_wire("checkout"), ActionType::Checkout);
        assert_eq!(ActionType::from_wire("error"), ActionType::None);
        assert_eq!(ActionType::from_wire("create"), ActionType::None);
        assert_eq!(ActionType::from_wire("refund_v2"), ActionType::None);
    }

    #[tokio::test]
    async fn test_blank_transcript_is_noop() {
        let interpreter = canned(ok_none);
        let dispatcher = Dispatcher::new(interpreter.clone());

        assert!(dispatcher.dispatch("   ", &Cart::new()).await.unwrap().is_none());
        assert!(interpreter.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sends_trimmed_text_and_reduced_context() {
        let interpreter = canned(ok_none);
        let dispatcher = Dispatcher::new(interpreter.clone());
        let cart: Cart = vec![CartLine {
            product_id: ProductId::Int(3),
            name: "Maggi".to_string(),
            quantity: 2,
            total_price: Decimal::from(30),
        }]
        .into_iter()
        .collect();

        let reply = dispatcher.dispatch("  add two maggi ", &cart).await.unwrap().unwrap();
        assert_eq!(reply.action, ActionType::None);

        let seen = interpreter.seen.lock().unwrap();
        assert_eq!(seen[0].text, "add two maggi");
        let json = serde_json::to_value(&seen[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": "add two maggi",
                "cart_context": [{ "product_id": 3, "quantity": 2 }]
            })
        );
    }

    #[tokio::test]
    async fn test_times_out() {
        let interpreter = Arc::new(Canned {
            response: ok_none,
            delay: Duration::from_secs(5),
            seen: Mutex::new(Vec::new()),
        });
        let dispatcher = Dispatcher::with_timeout(interpreter, Duration::from_millis(20));

        let err = dispatcher.dispatch("checkout", &Cart::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_missing_message_is_malformed() {
        let dispatcher = Dispatcher::new(canned(|| {
            Ok(serde_json::from_str(r#"{"action_type": "add"}"#).unwrap())
        }));

        let err = dispatcher.dispatch("add tea", &Cart::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_interpreter_error_propagates() {
        let dispatcher = Dispatcher::new(canned(|| {
            Err(DispatchError::Status {
                status: 500,
                body: "boom".to_string(),
            })
        }));

        let err = dispatcher.dispatch("add tea", &Cart::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Status { status: 500, .. }));
    }
}

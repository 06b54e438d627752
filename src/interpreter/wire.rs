//! Interpreter wire format

use serde::{Deserialize, Serialize};

use super::{ActionType, InterpreterReply};
use crate::cart::{ContextItem, DeltaLine};
use crate::error::DispatchError;
use crate::transaction::TransactionId;

/// Body of `POST /process-command`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Trimmed transcript
    pub text: String,
    /// Current cart reduced to `{product_id, quantity}`
    pub cart_context: Vec<ContextItem>,
}

/// Raw interpreter response
///
/// Everything is optional here so that a missing field surfaces as
/// [`DispatchError::Malformed`] instead of a serde error. Cart entries are
/// read leniently (see [`DeltaLine`]); unknown fields such as `unit_price`
/// are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Text to show and speak
    #[serde(default)]
    pub message: Option<String>,

    /// `add`, `remove`, `checkout`, or anything else
    #[serde(default)]
    pub action_type: Option<String>,

    /// Lines relevant to the action
    #[serde(default)]
    pub cart: Option<Vec<DeltaLine>>,

    /// Bill identifier after a checkout
    #[serde(default)]
    pub transaction_id: Option<TransactionId>,

    /// MP3 audio, base64-encoded
    #[serde(default)]
    pub audio_base64: Option<String>,
}

impl TryFrom<CommandResponse> for InterpreterReply {
    type Error = DispatchError;

    fn try_from(response: CommandResponse) -> Result<Self, Self::Error> {
        let action_type = response
            .action_type
            .ok_or_else(|| DispatchError::Malformed("missing action_type".to_string()))?;
        let message = response
            .message
            .ok_or_else(|| DispatchError::Malformed("missing message".to_string()))?;

        Ok(Self {
            action: ActionType::from_wire(&action_type),
            delta: response.cart.unwrap_or_default(),
            message,
            audio_payload: response.audio_base64.filter(|a| !a.is_empty()),
            transaction_id: response.transaction_id.filter(|id| !id.is_empty()),
        })
    }
}

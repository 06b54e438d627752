//! Tracks the most recent bill produced by a checkout

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::interpreter::{ActionType, InterpreterReply};

/// Opaque bill identifier
///
/// Accepted from the wire as either a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wrap an identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is blank
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(id) => Self(id.to_string()),
            Raw::Text(id) => Self(id),
        })
    }
}

/// Remembers the last successful checkout's transaction id
#[derive(Debug, Clone, Default)]
pub struct TransactionTracker {
    last: Option<TransactionId>,
}

impl TransactionTracker {
    /// Create an empty tracker
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Overwrite the stored id
    pub fn record(&mut self, id: TransactionId) {
        tracing::info!(transaction_id = %id, "bill generated");
        self.last = Some(id);
    }

    /// Forget the stored id
    pub fn clear(&mut self) {
        self.last = None;
    }

    /// Stored id, if any
    #[must_use]
    pub const fn current(&self) -> Option<&TransactionId> {
        self.last.as_ref()
    }

    /// Record the reply's id if it is a checkout that produced a bill
    ///
    /// A checkout without an id leaves the previous id in place. Returns
    /// whether the stored id changed.
    pub fn observe(&mut self, reply: &InterpreterReply) -> bool {
        if reply.action != ActionType::Checkout {
            return false;
        }

        match &reply.transaction_id {
            Some(id) if !id.is_empty() => {
                self.record(id.clone());
                true
            }
            _ => {
                tracing::debug!("checkout produced no bill, keeping previous transaction");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout(id: Option<&str>) -> InterpreterReply {
        InterpreterReply {
            action: ActionType::Checkout,
            transaction_id: id.map(TransactionId::new),
            ..InterpreterReply::message_only("Bill saved.")
        }
    }

    #[test]
    fn test_record_overwrites() {
        let mut tracker = TransactionTracker::new();
        tracker.record(TransactionId::new("T1"));
        tracker.record(TransactionId::new("T2"));
        assert_eq!(tracker.current().unwrap().as_str(), "T2");

        tracker.clear();
        assert!(tracker.current().is_none());
    }

    #[test]
    fn test_checkout_without_id_keeps_previous() {
        let mut tracker = TransactionTracker::new();
        tracker.record(TransactionId::new("T1"));

        assert!(!tracker.observe(&checkout(None)));
        assert!(!tracker.observe(&checkout(Some(" "))));
        assert_eq!(tracker.current().unwrap().as_str(), "T1");

        assert!(tracker.observe(&checkout(Some("TXN123"))));
        assert_eq!(tracker.current().unwrap().as_str(), "TXN123");
    }

    #[test]
    fn test_non_checkout_is_ignored() {
        let mut tracker = TransactionTracker::new();
        let add = InterpreterReply {
            action: ActionType::Add,
            transaction_id: Some(TransactionId::new("T9")),
            ..InterpreterReply::message_only("Added")
        };
        assert!(!tracker.observe(&add));
        assert!(tracker.current().is_none());
    }

    #[test]
    fn test_id_deserializes_from_int_or_string() {
        let ids: Vec<TransactionId> = serde_json::from_str(r#"[17, "TXN123"]"#).unwrap();
        assert_eq!(ids[0].as_str(), "17");
        assert_eq!(ids[1].as_str(), "TXN123");
    }
}

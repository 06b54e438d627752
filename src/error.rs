//! Error types for the voicebill session

use std::time::Duration;

use thiserror::Error;

/// Result type alias for voicebill operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a voice billing session
#[derive(Debug, Error)]
pub enum Error {
    /// No speech capture adapter is available
    #[error("speech capture unavailable")]
    CaptureUnavailable,

    /// Recognition engine failed mid-session
    #[error("capture error: {0}")]
    Capture(String),

    /// Interpreter round trip failed
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Reply carried a delta that cannot be applied
    #[error("reconciliation error: {0}")]
    Reconciliation(#[from] ReconciliationError),

    /// Audio decode or playback failure
    #[error("playback error: {0}")]
    Playback(String),

    /// A dispatch is already in flight for this session
    #[error("session busy: a command is already being processed")]
    Busy,

    /// Reply arrived after the session was reset
    #[error("reply discarded: session was reset while the command was in flight")]
    StaleReply,

    /// No checkout has produced a bill yet
    #[error("no bill generated yet")]
    NoBill,

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failure of one interpreter round trip
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Transport failure (connection refused, DNS, reset)
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    /// No reply within the configured request timeout
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// Interpreter answered with a non-success status
    #[error("interpreter returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Reply is missing required fields or is not valid JSON
    #[error("malformed reply: {0}")]
    Malformed(String),
}

/// A delta entry that cannot be applied to the cart
///
/// The index is the entry's position in the reply's delta list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    /// Entry has no product id
    #[error("delta entry {0} has no product id")]
    MissingProductId(usize),

    /// Entry has no quantity
    #[error("delta entry {0} has no quantity")]
    MissingQuantity(usize),

    /// Entry quantity is zero or negative
    #[error("delta entry {index} has non-positive quantity {quantity}")]
    NonPositiveQuantity {
        /// Entry position
        index: usize,
        /// Offending quantity
        quantity: i64,
    },

    /// Entry has no total price
    #[error("delta entry {0} has no total price")]
    MissingTotalPrice(usize),

    /// Entry total price is negative
    #[error("delta entry {0} has a negative total price")]
    NegativeTotalPrice(usize),

    /// Entry has a field of the wrong type
    #[error("delta entry {index} is invalid: {reason}")]
    InvalidEntry {
        /// Entry position
        index: usize,
        /// What failed to parse
        reason: String,
    },

    /// Adding the entry would overflow a line's quantity
    #[error("delta entry {0} overflows the line quantity")]
    QuantityOverflow(usize),

    /// Adding the entry would overflow a line's or the cart's total price
    #[error("delta entry {0} overflows the cart total")]
    PriceOverflow(usize),
}

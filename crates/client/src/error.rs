//! Error types for the FramePipe client core

use thiserror::Error;

/// Result type alias for FramePipe client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the FramePipe client core
///
/// `Negotiation` and `Signaling` are terminal for the current connection
/// attempt: the client tears down and the caller must create a fresh
/// instance. `TransportSend` aborts only the current frame's remaining
/// chunks; the connection stays usable. `InvalidInput` is rejected before
/// any network activity.
#[derive(Debug, Error)]
pub enum Error {
    /// Local negotiation failure (no local description, track or channel
    /// creation refused)
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// Signaling exchange failure (network error, bad status, unparseable
    /// or incomplete response)
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Per-chunk send failure on an established transport
    #[error("Transport send error: {0}")]
    TransportSend(String),

    /// Null or malformed frame buffer
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error ends the current connection attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::Negotiation(_) | Error::Signaling(_))
    }
}

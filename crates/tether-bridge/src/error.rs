//! Error types for bridges

use crate::relay::BridgeKey;
use tower::BoxError;

/// Result type alias using [`BridgeError`]
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// Errors raised while relaying between a tower service and the handler chain
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The request carries no relay record for this bridge
    #[error("no relay registered for {0}")]
    RelayMissing(BridgeKey),

    /// The bridged middleware that owned the relay has already returned
    #[error("relay for {0} is closed")]
    RelayClosed(BridgeKey),

    /// A handler after the bridge failed
    #[error("handler chain failed: {0}")]
    Downstream(String),

    /// A handler replaced the substituted writer and did not put it back
    #[error("response writer was replaced during a continuation")]
    WriterReplaced,

    /// The wrapped service returned an error
    #[error("wrapped service failed: {0}")]
    Service(#[source] BoxError),

    /// A request or response body could not be read
    #[error("failed to read body: {0}")]
    Body(#[source] BoxError),

    /// The wrapped service's response body exceeded the configured limit
    #[error("response body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

impl From<BridgeError> for tether_core::Error {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::RelayMissing(_) | BridgeError::WriterReplaced => {
                tether_core::Error::Internal(e.to_string())
            }
            _ => tether_core::Error::Middleware(e.to_string()),
        }
    }
}

//! Error types for the matrix bridge

use thiserror::Error;

use crate::action::PortKind;

/// Errors that can occur in the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Port number outside the matrix
    #[error("{kind} {index} is out of range")]
    PortOutOfRange {
        /// Whether an input or output was addressed
        kind: PortKind,
        /// The offending index, as given by the caller
        index: u8,
    },

    /// The bridge actor has shut down
    #[error("bridge actor is no longer running")]
    ActorClosed,
}

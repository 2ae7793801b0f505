//! Error types for matrix protocol parsing

use thiserror::Error;

/// Errors that can occur while parsing protocol data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A response token was not exactly two digits
    #[error("unexpected response: {token:?}")]
    MalformedToken { token: String },
}

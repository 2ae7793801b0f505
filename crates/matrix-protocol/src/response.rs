//! Matrix response parsing
//!
//! The matrix answers commands and status requests with a loosely formatted
//! ASCII stream. Each chunk is parsed independently:
//!
//! 1. Decode as UTF-8 (lossy)
//! 2. Drop every character that is neither an ASCII digit nor `s`
//! 3. Split on `s`
//! 4. Each non-empty token must be exactly two digits: `<input><output>`
//!
//! Bad tokens are reported individually and never abort the rest of the chunk.
//!
//! The parser only checks digits and length. `"99"` is a perfectly good
//! record even though no such port exists on an 8x8 matrix; deciding what to
//! do with it is up to the consumer.

use crate::error::ParseError;

/// Separator between mapping tokens in a response stream
pub const TOKEN_SEPARATOR: char = 's';

/// One `<input><output>` mapping reported by the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteRecord {
    /// Input (source) port, 0-based digit
    pub input: u8,
    /// Output (destination) port, 0-based digit
    pub output: u8,
}

impl RouteRecord {
    /// `token` holds only ASCII digits; only its length can be wrong
    fn from_token(token: &str) -> Result<Self, ParseError> {
        match token.as_bytes() {
            [input, output] => Ok(Self {
                input: input - b'0',
                output: output - b'0',
            }),
            _ => Err(ParseError::MalformedToken {
                token: token.to_string(),
            }),
        }
    }
}

/// Parse one chunk of matrix output
///
/// Returns one entry per non-empty token, left to right, so callers can
/// apply good records and report bad ones in stream order.
pub fn parse_response(data: &[u8]) -> Vec<Result<RouteRecord, ParseError>> {
    let cleaned: String = String::from_utf8_lossy(data)
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == TOKEN_SEPARATOR)
        .collect();

    cleaned
        .split(TOKEN_SEPARATOR)
        .filter(|token| !token.is_empty())
        .map(RouteRecord::from_token)
        .collect()
}

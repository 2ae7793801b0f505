//! Fourkay Matrix Protocol Library
//!
//! This crate provides parsing and encoding for the ASCII control protocol
//! spoken by Fourkay 8x8 HDMI matrix switches over a raw TCP socket.
//!
//! # Format
//!
//! Commands sent TO the matrix are terse and unterminated:
//! - `cir <input><output>` - route one input to one output (single digits, 0-based)
//! - `bc ` - request a full routing status dump
//!
//! Responses FROM the matrix are an ASCII stream of digit pairs, each pair
//! being one `<input><output>` mapping. Pairs are optionally separated by a
//! literal `s`; every other character is noise and is discarded.
//!
//! The same bytes mean different things depending on direction, so this
//! crate provides:
//! - [`parse_response`] for the matrix → controller direction
//! - [`MatrixCommand`] + [`EncodeCommand`] for controller → matrix
//! - [`CommandCodec`], a streaming decoder for the controller → matrix
//!   direction, used by device simulators
//!
//! # Example
//!
//! ```rust
//! use matrix_protocol::{parse_response, EncodeCommand, MatrixCommand, ParseError, RouteRecord};
//!
//! // Route input 2 to output 5
//! let cmd = MatrixCommand::Route { input: 2, output: 5 };
//! assert_eq!(cmd.encode(), b"cir 25");
//!
//! // Parse a status response from the matrix, one result per token
//! let records = parse_response(b"s25s31s4\r\n");
//! assert_eq!(
//!     records,
//!     vec![
//!         Ok(RouteRecord { input: 2, output: 5 }),
//!         Ok(RouteRecord { input: 3, output: 1 }),
//!         Err(ParseError::MalformedToken { token: "4".into() }),
//!     ]
//! );
//! ```

pub mod codec;
pub mod command;
pub mod error;
pub mod response;

pub use codec::CommandCodec;
pub use command::MatrixCommand;
pub use error::ParseError;
pub use response::{parse_response, RouteRecord, TOKEN_SEPARATOR};

/// Number of inputs and outputs on the matrix
///
/// The wire format addresses ports with a single decimal digit, so nothing
/// above 10 ports can be expressed.
pub const PORT_COUNT: usize = 8;

/// Default TCP port the matrix listens on
pub const DEFAULT_TCP_PORT: u16 = 22;

/// Trait for protocol codecs that can parse incoming data streams
pub trait ProtocolCodec {
    /// The command type produced by this codec
    type Command;

    /// Push raw bytes into the codec's buffer
    fn push_bytes(&mut self, data: &[u8]);

    /// Try to extract the next complete command from the buffer
    fn next_command(&mut self) -> Option<Self::Command>;

    /// Try to extract the next complete command along with the exact bytes
    /// it was decoded from
    fn next_command_with_bytes(&mut self) -> Option<(Self::Command, Vec<u8>)>;

    /// Clear the internal buffer
    fn clear(&mut self);
}

/// Trait for commands that can be encoded to bytes
pub trait EncodeCommand {
    /// Encode this command to its wire format
    fn encode(&self) -> Vec<u8>;
}

//! Matrix command representation and encoding

use std::fmt;

use crate::{EncodeCommand, PORT_COUNT};

/// Prefix of the single-output route command
pub const ROUTE_PREFIX: &str = "cir ";

/// Literal status request command (trailing space included)
pub const STATUS_REQUEST: &str = "bc ";

/// Commands understood by the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatrixCommand {
    /// Route an input to an output: `cir <input><output>`
    ///
    /// Both indices are 0-based and must be single decimal digits.
    Route { input: u8, output: u8 },
    /// Request a full routing dump: `bc `
    StatusRequest,
}

impl MatrixCommand {
    /// Commands routing `input` to every output, in ascending output order
    ///
    /// The matrix has no "all outputs" command, so this is simply one
    /// `Route` per output. Nothing makes the sequence atomic.
    pub fn route_all(input: u8) -> impl Iterator<Item = MatrixCommand> {
        (0..PORT_COUNT as u8).map(move |output| MatrixCommand::Route { input, output })
    }
}

impl EncodeCommand for MatrixCommand {
    fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for MatrixCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Route { input, output } => write!(f, "{}{}{}", ROUTE_PREFIX, input, output),
            Self::StatusRequest => f.write_str(STATUS_REQUEST),
        }
    }
}

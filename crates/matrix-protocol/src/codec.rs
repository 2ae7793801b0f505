//! Streaming decoder for commands sent to the matrix
//!
//! Matrix commands carry no terminator and TCP is free to coalesce or split
//! writes, so a device-side reader may see `cir 20cir 2` followed later by
//! `1bc `. This codec buffers input and yields complete commands as soon as
//! their last byte arrives. Bytes that cannot begin a known command are
//! dropped.

use tracing::debug;

use crate::command::{MatrixCommand, ROUTE_PREFIX, STATUS_REQUEST};
use crate::ProtocolCodec;

/// Maximum buffered bytes before old data is discarded
const MAX_BUFFER_LEN: usize = 256;

/// Length of a complete route command: `cir ` + two digits
const ROUTE_LEN: usize = 6;

/// Streaming matrix command codec
pub struct CommandCodec {
    buffer: Vec<u8>,
}

impl CommandCodec {
    /// Create a new command codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
        }
    }

    /// Number of bytes waiting for more data
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn starts_partial(&self, literal: &str) -> bool {
        let literal = literal.as_bytes();
        self.buffer.len() < literal.len() && literal.starts_with(&self.buffer)
    }
}

impl Default for CommandCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolCodec for CommandCodec {
    type Command = MatrixCommand;

    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        if self.buffer.len() > MAX_BUFFER_LEN {
            let start = self.buffer.len() - ROUTE_LEN;
            self.buffer.drain(..start);
        }
    }

    fn next_command(&mut self) -> Option<Self::Command> {
        self.next_command_with_bytes().map(|(cmd, _)| cmd)
    }

    fn next_command_with_bytes(&mut self) -> Option<(Self::Command, Vec<u8>)> {
        let mut dropped = 0usize;

        let result = loop {
            if self.buffer.is_empty() {
                break None;
            }

            if self.buffer.starts_with(ROUTE_PREFIX.as_bytes()) {
                if self.buffer.len() < ROUTE_LEN {
                    break None;
                }
                let (input, output) = (self.buffer[4], self.buffer[5]);
                if input.is_ascii_digit() && output.is_ascii_digit() {
                    let bytes: Vec<u8> = self.buffer.drain(..ROUTE_LEN).collect();
                    let cmd = MatrixCommand::Route {
                        input: input - b'0',
                        output: output - b'0',
                    };
                    break Some((cmd, bytes));
                }
                // `cir ` without two digits behind it: resync past the `c`
                self.buffer.remove(0);
                dropped += 1;
                continue;
            }

            if self.buffer.starts_with(STATUS_REQUEST.as_bytes()) {
                let bytes: Vec<u8> = self.buffer.drain(..STATUS_REQUEST.len()).collect();
                break Some((MatrixCommand::StatusRequest, bytes));
            }

            if self.starts_partial(ROUTE_PREFIX) || self.starts_partial(STATUS_REQUEST) {
                break None;
            }

            self.buffer.remove(0);
            dropped += 1;
        };

        if dropped > 0 {
            debug!("Discarded {} unrecognised command bytes", dropped);
        }

        result
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(codec: &mut CommandCodec) -> Vec<MatrixCommand> {
        std::iter::from_fn(|| codec.next_command()).collect()
    }

    #[test]
    fn test_coalesced_commands() {
        let mut codec = CommandCodec::new();
        codec.push_bytes(b"cir 20cir 21bc ");
        assert_eq!(
            drain(&mut codec),
            vec![
                MatrixCommand::Route {
                    input: 2,
                    output: 0
                },
                MatrixCommand::Route {
                    input: 2,
                    output: 1
                },
                MatrixCommand::StatusRequest,
            ]
        );
        assert_eq!(codec.pending(), 0);
    }

    #[test]
    fn test_split_command_waits_for_more_data() {
        let mut codec = CommandCodec::new();
        codec.push_bytes(b"ci");
        assert!(codec.next_command().is_none());
        codec.push_bytes(b"r 3");
        assert!(codec.next_command().is_none());
        codec.push_bytes(b"5b");
        assert_eq!(
            codec.next_command(),
            Some(MatrixCommand::Route {
                input: 3,
                output: 5
            })
        );
        assert!(codec.next_command().is_none());
        codec.push_bytes(b"c ");
        assert_eq!(codec.next_command(), Some(MatrixCommand::StatusRequest));
    }

    #[test]
    fn test_noise_is_skipped() {
        let mut codec = CommandCodec::new();
        codec.push_bytes(b"\r\nxx cir 4x bc ");
        assert_eq!(drain(&mut codec), vec![MatrixCommand::StatusRequest]);
    }

    #[test]
    fn test_raw_bytes_are_returned() {
        let mut codec = CommandCodec::new();
        codec.push_bytes(b"zzcir 07");
        let (cmd, bytes) = codec.next_command_with_bytes().unwrap();
        assert_eq!(
            cmd,
            MatrixCommand::Route {
                input: 0,
                output: 7
            }
        );
        assert_eq!(bytes, b"cir 07");
    }

    #[test]
    fn test_buffer_is_bounded() {
        let mut codec = CommandCodec::new();
        codec.push_bytes(&[b'c'; MAX_BUFFER_LEN + 10]);
        assert!(codec.pending() <= MAX_BUFFER_LEN);
        codec.clear();
        assert_eq!(codec.pending(), 0);
    }
}

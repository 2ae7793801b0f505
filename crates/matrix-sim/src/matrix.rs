//! Virtual matrix for testing
//!
//! Tracks a routing table and answers commands the way the real matrix
//! does: route commands are echoed as a single `s<in><out>` token, status
//! requests dump every output. Responses end in CRLF, which controllers must
//! treat as noise.

use matrix_protocol::{MatrixCommand, PORT_COUNT, TOKEN_SEPARATOR};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration for a virtual matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMatrixConfig {
    /// Identifier for logging
    pub id: String,
    /// Whether route commands are acknowledged with the new mapping
    #[serde(default = "default_true")]
    pub echo_routes: bool,
}

fn default_true() -> bool {
    true
}

impl Default for VirtualMatrixConfig {
    fn default() -> Self {
        Self {
            id: "virtual-matrix".to_string(),
            echo_routes: true,
        }
    }
}

/// Virtual 8x8 matrix
#[derive(Debug, Clone)]
pub struct VirtualMatrix {
    id: String,
    routing: [u8; PORT_COUNT],
    echo_routes: bool,
    /// Commands received (for test verification)
    received_commands: Vec<MatrixCommand>,
}

impl VirtualMatrix {
    /// Create a matrix with identity routing
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            routing: std::array::from_fn(|o| o as u8),
            echo_routes: true,
            received_commands: Vec::new(),
        }
    }

    /// Create from a saved configuration
    pub fn from_config(config: &VirtualMatrixConfig) -> Self {
        let mut matrix = Self::new(config.id.clone());
        matrix.set_echo_routes(config.echo_routes);
        matrix
    }

    /// Get the identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current routing, indexed by output
    pub fn routing(&self) -> [u8; PORT_COUNT] {
        self.routing
    }

    /// Enable or disable route acknowledgements
    pub fn set_echo_routes(&mut self, enabled: bool) {
        self.echo_routes = enabled;
    }

    /// Commands processed so far
    pub fn received_commands(&self) -> &[MatrixCommand] {
        &self.received_commands
    }

    /// Change routing without any command, as the front panel would
    ///
    /// Returns true if routing changed.
    pub fn front_panel_route(&mut self, input: u8, output: u8) -> bool {
        self.set_route(input, output)
    }

    fn set_route(&mut self, input: u8, output: u8) -> bool {
        if input as usize >= PORT_COUNT || output as usize >= PORT_COUNT {
            warn!(
                "{}: ignoring route {} -> {} outside the matrix",
                self.id, input, output
            );
            return false;
        }
        let changed = self.routing[output as usize] != input;
        self.routing[output as usize] = input;
        changed
    }

    /// Process a command, returning the bytes to send back (if any)
    pub fn process_command(&mut self, cmd: MatrixCommand) -> Option<Vec<u8>> {
        self.received_commands.push(cmd);
        debug!("{} processing {:?}", self.id, cmd.to_string());

        match cmd {
            MatrixCommand::Route { input, output } => {
                self.set_route(input, output);
                self.echo_routes
                    .then(|| format!("{}{}{}\r\n", TOKEN_SEPARATOR, input, output).into_bytes())
            }
            MatrixCommand::StatusRequest => Some(self.status_dump()),
        }
    }

    /// Full routing dump: `s<in>0s<in>1...s<in>7` + CRLF
    pub fn status_dump(&self) -> Vec<u8> {
        let mut dump = String::with_capacity(PORT_COUNT * 3 + 2);
        for (output, input) in self.routing.iter().enumerate() {
            dump.push(TOKEN_SEPARATOR);
            dump.push_str(&format!("{}{}", input, output));
        }
        dump.push_str("\r\n");
        dump.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_dump_is_identity() {
        let matrix = VirtualMatrix::new("t");
        assert_eq!(matrix.status_dump(), b"s00s11s22s33s44s55s66s77\r\n");
    }

    #[test]
    fn test_route_updates_and_echoes() {
        let mut matrix = VirtualMatrix::new("t");
        let reply = matrix.process_command(MatrixCommand::Route {
            input: 2,
            output: 5,
        });
        assert_eq!(reply, Some(b"s25\r\n".to_vec()));
        assert_eq!(matrix.routing()[5], 2);
        assert_eq!(matrix.received_commands().len(), 1);
    }

    #[test]
    fn test_silent_routes() {
        let mut matrix = VirtualMatrix::from_config(&VirtualMatrixConfig {
            id: "quiet".into(),
            echo_routes: false,
        });
        assert_eq!(
            matrix.process_command(MatrixCommand::Route {
                input: 1,
                output: 0
            }),
            None
        );
        assert_eq!(matrix.routing()[0], 1);
    }

    #[test]
    fn test_out_of_range_route_is_ignored() {
        let mut matrix = VirtualMatrix::new("t");
        assert!(!matrix.front_panel_route(9, 0));
        assert!(!matrix.front_panel_route(0, 8));
        assert_eq!(matrix.routing(), [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_front_panel_shows_in_dump() {
        let mut matrix = VirtualMatrix::new("t");
        assert!(matrix.front_panel_route(7, 0));
        assert!(!matrix.front_panel_route(7, 0));
        let reply = matrix.process_command(MatrixCommand::StatusRequest).unwrap();
        assert!(reply.starts_with(b"s70s11"));
    }
}

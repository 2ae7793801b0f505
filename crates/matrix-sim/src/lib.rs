//! Fourkay Matrix Simulation Library
//!
//! This crate provides a simulated 8x8 HDMI matrix for exercising the bridge
//! without hardware. It includes:
//!
//! - **VirtualMatrix**: routing table plus protocol-accurate responses
//! - **run_virtual_matrix_task**: drives a `VirtualMatrix` over any async stream
//! - **VirtualMatrixServer**: serves a `VirtualMatrix` on a TCP listener
//!
//! # Example
//!
//! ```rust
//! use matrix_protocol::MatrixCommand;
//! use matrix_sim::VirtualMatrix;
//!
//! let mut matrix = VirtualMatrix::new("bench");
//!
//! // Route input 4 to output 1 and read the echo
//! let reply = matrix.process_command(MatrixCommand::Route { input: 4, output: 1 });
//! assert_eq!(reply, Some(b"s41\r\n".to_vec()));
//!
//! // Someone presses buttons on the front panel
//! matrix.front_panel_route(6, 7);
//! assert_eq!(matrix.routing()[7], 6);
//! ```

pub mod matrix;
pub mod server;
pub mod task;

pub use matrix::{VirtualMatrix, VirtualMatrixConfig};
pub use server::VirtualMatrixServer;
pub use task::{run_virtual_matrix_task, TaskEnd, VirtualMatrixCommand, VirtualMatrixEvent};

//! Fourkay Matrix Bridge
//!
//! This crate keeps a local model of an 8x8 HDMI matrix's routing table in
//! sync with the device and exposes it to a host application.
//!
//! # Architecture
//!
//! - [`MatrixBridge`] is the synchronous engine: routing table, action to
//!   command translation and response parsing. No I/O.
//! - The bridge actor ([`actor`]) owns the engine, one TCP connection task
//!   and one poll task. Configuration changes replace both wholesale.
//! - [`BridgeHandle`] is the cloneable front door: lifecycle, actions,
//!   feedback queries and a broadcast [`BridgeEvent`] stream.
//!
//! Sends are fire-and-forget. A command issued while the socket is down is
//! dropped (and logged at debug level), not queued.
//!
//! # Example
//!
//! ```rust,no_run
//! use matrix_bridge::{spawn_bridge, DeviceEndpoint};
//!
//! # async fn demo() -> Result<(), matrix_bridge::BridgeError> {
//! let (bridge, _task) = spawn_bridge();
//! bridge.start(DeviceEndpoint::new("192.168.0.3", 22)).await?;
//!
//! // Route input 3 to output 6 (0-based)
//! bridge.select_input(2).await?;
//! bridge.switch_output(5).await?;
//!
//! let lit = bridge.is_output_fed_by_selected(5).await?;
//! # let _ = lit;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod actor;
pub mod connection;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod events;
pub mod handle;
pub mod poller;
pub mod state;

pub use action::{check_port, port_from_user, Action, Feedback, PortKind};
pub use actor::{run_bridge_actor, BridgeActorCommand};
pub use endpoint::DeviceEndpoint;
pub use engine::MatrixBridge;
pub use error::BridgeError;
pub use events::BridgeEvent;
pub use handle::{spawn_bridge, BridgeHandle};
pub use state::{ApplyOutcome, ConnectionStatus, ResourceSummary, RoutingState};

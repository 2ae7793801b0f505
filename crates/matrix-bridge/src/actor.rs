//! Bridge Actor
//!
//! This module provides the async actor that owns everything stateful about
//! one matrix: the engine (routing table), the connection task handle and the
//! poll task handle. All mutation happens inside this one task, so none of it
//! needs locking.
//!
//! # Architecture
//!
//! The actor receives [`BridgeActorCommand`]s through a channel and
//! broadcasts [`BridgeEvent`]s. Collaborators normally go through
//! [`BridgeHandle`](crate::BridgeHandle) rather than building commands
//! themselves.
//!
//! The connection and poll tasks hold only weak senders back to the actor
//! and stamp what they send with the configuration generation they were
//! created for. Reconfiguration bumps the generation, so late messages from
//! replaced tasks are ignored.
//!
//! # Example
//!
//! ```rust,ignore
//! use matrix_bridge::actor::{run_bridge_actor, BridgeActorCommand};
//! use tokio::sync::{broadcast, mpsc};
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(256);
//! let (event_tx, _) = broadcast::channel(256);
//!
//! tokio::spawn(run_bridge_actor(cmd_rx, cmd_tx.downgrade(), event_tx));
//! ```

use matrix_protocol::{EncodeCommand, MatrixCommand};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::action::{Action, Feedback};
use crate::connection::ConnectionHandle;
use crate::endpoint::DeviceEndpoint;
use crate::engine::MatrixBridge;
use crate::events::BridgeEvent;
use crate::poller::Poller;
use crate::state::{ConnectionStatus, ResourceSummary, RoutingState};

/// Commands sent to the bridge actor
#[derive(Debug)]
pub enum BridgeActorCommand {
    /// Tear down any existing connection and poll task, then build new ones
    Configure {
        /// Endpoint to use from now on
        endpoint: DeviceEndpoint,
    },

    /// Tear down the connection and poll task
    Stop,

    /// Perform an action (ports already validated)
    Action {
        /// The action
        action: Action,
    },

    /// Answer a feedback query
    Query {
        /// The question
        feedback: Feedback,
        /// Channel to send back the answer
        response: oneshot::Sender<bool>,
    },

    /// Snapshot the routing table
    QueryRouting {
        /// Channel to send back the snapshot
        response: oneshot::Sender<RoutingState>,
    },

    /// Report which resources are alive
    QueryResources {
        /// Channel to send back the summary
        response: oneshot::Sender<ResourceSummary>,
    },

    /// Status change from a connection task
    ConnectionStatus {
        /// Generation of the reporting connection
        generation: u64,
        /// New status
        status: ConnectionStatus,
        /// Optional detail
        message: Option<String>,
    },

    /// Transport error from a connection task
    ConnectionError {
        /// Generation of the reporting connection
        generation: u64,
        /// Error message
        message: String,
    },

    /// Bytes received by a connection task
    DeviceData {
        /// Generation of the reporting connection
        generation: u64,
        /// Raw bytes received
        data: Vec<u8>,
    },

    /// Poll timer fired
    PollTick {
        /// Generation of the poll task
        generation: u64,
    },

    /// Shutdown the actor
    Shutdown,
}

/// Internal state for the bridge actor
struct BridgeActorState {
    /// The bridge engine
    bridge: MatrixBridge,
    /// Endpoint in use, if started
    endpoint: Option<DeviceEndpoint>,
    /// Current connection task
    connection: Option<ConnectionHandle>,
    /// Poll task owner
    poller: Poller,
    /// Bumped on every configure
    generation: u64,
    /// Handed to spawned tasks
    self_tx: mpsc::WeakSender<BridgeActorCommand>,
    /// Event broadcast
    event_tx: broadcast::Sender<BridgeEvent>,
}

impl BridgeActorState {
    fn new(
        self_tx: mpsc::WeakSender<BridgeActorCommand>,
        event_tx: broadcast::Sender<BridgeEvent>,
    ) -> Self {
        Self {
            bridge: MatrixBridge::new(),
            endpoint: None,
            connection: None,
            poller: Poller::new(),
            generation: 0,
            self_tx,
            event_tx,
        }
    }

    fn emit(&self, event: BridgeEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn flush_engine_events(&mut self) {
        for event in self.bridge.drain_events() {
            self.emit(event);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && self.connection.is_some()
    }

    /// Cancel the poll task and close the socket
    ///
    /// Returns only once both tasks are gone, so nothing from the old
    /// configuration overlaps whatever is built next.
    async fn teardown(&mut self) {
        self.poller.shutdown().await;

        if let Some(connection) = self.connection.take() {
            let was = connection.status();
            connection.close().await;
            if was != ConnectionStatus::Disconnected {
                self.emit(BridgeEvent::ConnectionStatusChanged {
                    status: ConnectionStatus::Disconnected,
                    message: Some("connection closed".to_string()),
                });
            }
        }
    }

    async fn configure(&mut self, endpoint: DeviceEndpoint) {
        self.teardown().await;
        self.generation += 1;

        if endpoint.has_host() {
            info!(
                "Connecting to matrix at {} (generation {})",
                endpoint.address(),
                self.generation
            );
            self.connection = Some(ConnectionHandle::spawn(
                &endpoint,
                self.generation,
                self.self_tx.clone(),
            ));
        } else {
            info!("No matrix host configured; not connecting");
        }

        self.poller.start(
            endpoint.poll_interval(),
            self.generation,
            self.self_tx.clone(),
        );

        self.endpoint = Some(endpoint.clone());
        self.emit(BridgeEvent::Configured { endpoint });
    }

    async fn stop(&mut self) {
        let was_running = self.endpoint.take().is_some();
        self.teardown().await;
        if was_running {
            info!("Bridge stopped");
            self.emit(BridgeEvent::Stopped);
        }
    }

    /// Best-effort send: silently skipped when there is no socket
    fn send_command(&mut self, cmd: MatrixCommand) {
        let data = cmd.encode();
        match &self.connection {
            Some(connection) if connection.is_connected() => {
                if connection.send(data.clone()) {
                    debug!("Sent {:?}", cmd.to_string());
                    self.emit(BridgeEvent::DataOut { data });
                }
            }
            _ => debug!("Matrix not connected, not sending {:?}", cmd.to_string()),
        }
    }

    fn resources(&self) -> ResourceSummary {
        ResourceSummary {
            generation: self.generation,
            poll_task_active: self.poller.is_active(),
            connection_active: self.connection.is_some(),
            connection_status: self
                .connection
                .as_ref()
                .map(|c| c.status())
                .unwrap_or_default(),
        }
    }
}

/// Run the bridge actor
///
/// This is the main entry point for the actor. It processes commands until
/// `Shutdown` is received or every strong sender is dropped.
pub async fn run_bridge_actor(
    mut cmd_rx: mpsc::Receiver<BridgeActorCommand>,
    self_tx: mpsc::WeakSender<BridgeActorCommand>,
    event_tx: broadcast::Sender<BridgeEvent>,
) {
    let mut state = BridgeActorState::new(self_tx, event_tx);
    info!("Bridge actor started");

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            BridgeActorCommand::Configure { endpoint } => {
                state.configure(endpoint).await;
            }

            BridgeActorCommand::Stop => {
                state.stop().await;
            }

            BridgeActorCommand::Action { action } => {
                for cmd in state.bridge.handle_action(&action) {
                    state.send_command(cmd);
                }
                state.flush_engine_events();
            }

            BridgeActorCommand::Query { feedback, response } => {
                let _ = response.send(state.bridge.query(feedback));
            }

            BridgeActorCommand::QueryRouting { response } => {
                let _ = response.send(state.bridge.routing().clone());
            }

            BridgeActorCommand::QueryResources { response } => {
                let _ = response.send(state.resources());
            }

            BridgeActorCommand::ConnectionStatus {
                generation,
                status,
                message,
            } => {
                if !state.is_current(generation) {
                    debug!("Ignoring status from stale connection {}", generation);
                    continue;
                }
                if let Some(connection) = state.connection.as_mut() {
                    if connection.status() == status {
                        continue;
                    }
                    connection.set_status(status);
                }
                info!("Matrix connection {}", status.name());
                state.emit(BridgeEvent::ConnectionStatusChanged { status, message });
            }

            BridgeActorCommand::ConnectionError {
                generation,
                message,
            } => {
                if !state.is_current(generation) {
                    continue;
                }
                warn!("Network error: {}", message);
                state.emit(BridgeEvent::Error {
                    source: "Network".to_string(),
                    message,
                });
            }

            BridgeActorCommand::DeviceData { generation, data } => {
                if !state.is_current(generation) {
                    debug!("Ignoring {} bytes from stale connection", data.len());
                    continue;
                }
                state.emit(BridgeEvent::DataIn { data: data.clone() });
                state.bridge.process_response(&data);
                state.flush_engine_events();
            }

            BridgeActorCommand::PollTick { generation } => {
                if generation != state.generation || !state.poller.is_active() {
                    continue;
                }
                let cmd = state.bridge.status_request();
                state.send_command(cmd);
            }

            BridgeActorCommand::Shutdown => {
                break;
            }
        }
    }

    state.teardown().await;
    info!("Bridge actor stopped");
}

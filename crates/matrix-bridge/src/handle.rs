//! Cloneable handle to a running bridge actor
//!
//! This is the surface host adapters program against: lifecycle
//! (`start`/`reconfigure`/`stop`), actions, feedback queries and the event
//! stream. Port indices are 0-based.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::action::{Action, Feedback};
use crate::actor::{run_bridge_actor, BridgeActorCommand};
use crate::endpoint::DeviceEndpoint;
use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::state::{ResourceSummary, RoutingState};

/// Capacity of the actor command channel
const COMMAND_QUEUE_LEN: usize = 256;

/// Capacity of the event broadcast channel
const EVENT_QUEUE_LEN: usize = 256;

/// Spawn a bridge actor and return a handle to it
///
/// The actor does nothing until [`BridgeHandle::start`] is called. It exits
/// on [`BridgeHandle::shutdown`] or when every handle has been dropped.
pub fn spawn_bridge() -> (BridgeHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_LEN);
    let (event_tx, _) = broadcast::channel(EVENT_QUEUE_LEN);
    let task = tokio::spawn(run_bridge_actor(
        cmd_rx,
        cmd_tx.downgrade(),
        event_tx.clone(),
    ));

    (BridgeHandle { cmd_tx, event_tx }, task)
}

/// Handle to a bridge actor
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    cmd_tx: mpsc::Sender<BridgeActorCommand>,
    event_tx: broadcast::Sender<BridgeEvent>,
}

impl BridgeHandle {
    /// Subscribe to bridge events
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.event_tx.subscribe()
    }

    async fn send(&self, cmd: BridgeActorCommand) -> Result<(), BridgeError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| BridgeError::ActorClosed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> BridgeActorCommand,
    ) -> Result<T, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| BridgeError::ActorClosed)
    }

    /// Connect to `endpoint` and begin polling
    pub async fn start(&self, endpoint: DeviceEndpoint) -> Result<(), BridgeError> {
        self.send(BridgeActorCommand::Configure { endpoint }).await
    }

    /// Replace the endpoint: old connection and poll task are torn down first
    pub async fn reconfigure(&self, endpoint: DeviceEndpoint) -> Result<(), BridgeError> {
        self.send(BridgeActorCommand::Configure { endpoint }).await
    }

    /// Close the connection and cancel polling; safe to repeat
    pub async fn stop(&self) -> Result<(), BridgeError> {
        self.send(BridgeActorCommand::Stop).await
    }

    /// End the actor
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        self.send(BridgeActorCommand::Shutdown).await
    }

    /// Perform an action after checking its port bounds
    pub async fn action(&self, action: Action) -> Result<(), BridgeError> {
        action.validate()?;
        self.send(BridgeActorCommand::Action { action }).await
    }

    /// Arm an input as the source for subsequent switches
    pub async fn select_input(&self, input: u8) -> Result<(), BridgeError> {
        self.action(Action::SelectInput { input }).await
    }

    /// Route the selected input to `output`
    pub async fn switch_output(&self, output: u8) -> Result<(), BridgeError> {
        self.action(Action::SwitchOutput { output }).await
    }

    /// Route the selected input to every output
    pub async fn all_outputs_to_selected(&self) -> Result<(), BridgeError> {
        self.action(Action::AllOutputsToSelected).await
    }

    /// Feed `text` straight into the response parser
    pub async fn inject_test_response(&self, text: impl Into<String>) -> Result<(), BridgeError> {
        self.action(Action::InjectTestResponse { text: text.into() })
            .await
    }

    /// Answer a feedback query
    pub async fn query(&self, feedback: Feedback) -> Result<bool, BridgeError> {
        self.request(|response| BridgeActorCommand::Query { feedback, response })
            .await
    }

    /// Whether `input` is the selected input
    pub async fn is_input_selected(&self, input: u8) -> Result<bool, BridgeError> {
        self.query(Feedback::InputSelected { input }).await
    }

    /// Whether `output` is fed by the selected input
    pub async fn is_output_fed_by_selected(&self, output: u8) -> Result<bool, BridgeError> {
        self.query(Feedback::OutputFedBySelected { output }).await
    }

    /// Snapshot of the routing table
    pub async fn routing(&self) -> Result<RoutingState, BridgeError> {
        self.request(|response| BridgeActorCommand::QueryRouting { response })
            .await
    }

    /// Which resources the actor currently owns
    pub async fn resources(&self) -> Result<ResourceSummary, BridgeError> {
        self.request(|response| BridgeActorCommand::QueryResources { response })
            .await
    }
}

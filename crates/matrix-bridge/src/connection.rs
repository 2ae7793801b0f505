//! Async TCP transport for the matrix connection
//!
//! The connection runs in its own spawned task and talks back to the bridge
//! actor through a weak sender, tagging every message with the generation it
//! was created for. Once the actor replaces the connection, anything the old
//! task still manages to send is recognised as stale and dropped.
//!
//! The task reports `Connecting`, `Connected` and `Disconnected` as they
//! happen. If a reconnect delay is configured it retries after that fixed
//! delay; otherwise it stays disconnected until it is replaced.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::actor::BridgeActorCommand;
use crate::endpoint::DeviceEndpoint;
use crate::state::ConnectionStatus;

/// Capacity of the outbound command queue
const SEND_QUEUE_LEN: usize = 64;

/// Read buffer size
const READ_BUF_LEN: usize = 1024;

/// Why a connected session ended
enum SessionEnd {
    Shutdown,
    Closed,
    Failed(String),
}

/// Actor-side handle to a running connection task
pub struct ConnectionHandle {
    generation: u64,
    address: String,
    status: ConnectionStatus,
    send_tx: mpsc::Sender<Vec<u8>>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Spawn a connection task for `endpoint`
    pub fn spawn(
        endpoint: &DeviceEndpoint,
        generation: u64,
        bridge_tx: mpsc::WeakSender<BridgeActorCommand>,
    ) -> Self {
        let (send_tx, send_rx) = mpsc::channel(SEND_QUEUE_LEN);
        let address = endpoint.address();
        let task = tokio::spawn(run_connection(
            address.clone(),
            endpoint.reconnect_delay(),
            generation,
            send_rx,
            bridge_tx,
        ));

        Self {
            generation,
            address,
            status: ConnectionStatus::Disconnected,
            send_tx,
            task,
        }
    }

    /// Last status reported by the task
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Record a status reported by the task
    pub fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    /// Whether the socket is established
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Queue bytes for writing
    ///
    /// Best effort: returns false without sending if the socket is not
    /// established or the queue is full.
    pub fn send(&self, data: Vec<u8>) -> bool {
        if !self.is_connected() {
            debug!("Matrix socket not connected, dropping {} bytes", data.len());
            return false;
        }

        match self.send_tx.try_send(data) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not queue data for {}: {}", self.address, e);
                false
            }
        }
    }

    /// Stop the task and wait until its socket has been dropped
    ///
    /// The task is cancelled wherever it is (connecting, pumping, waiting to
    /// retry), so this returns promptly.
    pub async fn close(self) {
        self.task.abort();
        match self.task.await {
            Err(e) if e.is_panic() => {
                warn!("Connection task for {} panicked", self.address);
            }
            _ => {}
        }
        debug!(
            "Closed connection to {} (generation {})",
            self.address, self.generation
        );
    }
}

/// Forward a message to the actor; false once the actor is gone
async fn report(bridge_tx: &mpsc::WeakSender<BridgeActorCommand>, cmd: BridgeActorCommand) -> bool {
    let Some(tx) = bridge_tx.upgrade() else {
        return false;
    };
    tx.send(cmd).await.is_ok()
}

async fn report_status(
    bridge_tx: &mpsc::WeakSender<BridgeActorCommand>,
    generation: u64,
    status: ConnectionStatus,
    message: Option<String>,
) -> bool {
    report(
        bridge_tx,
        BridgeActorCommand::ConnectionStatus {
            generation,
            status,
            message,
        },
    )
    .await
}

async fn report_error(
    bridge_tx: &mpsc::WeakSender<BridgeActorCommand>,
    generation: u64,
    message: String,
) -> bool {
    report(
        bridge_tx,
        BridgeActorCommand::ConnectionError {
            generation,
            message,
        },
    )
    .await
}

/// Connection task body
async fn run_connection(
    address: String,
    reconnect_delay: Option<Duration>,
    generation: u64,
    mut send_rx: mpsc::Receiver<Vec<u8>>,
    bridge_tx: mpsc::WeakSender<BridgeActorCommand>,
) {
    loop {
        if !report_status(&bridge_tx, generation, ConnectionStatus::Connecting, None).await {
            return;
        }

        match TcpStream::connect(&address).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Could not set TCP_NODELAY on {}: {}", address, e);
                }
                info!("Connected to matrix at {}", address);
                if !report_status(
                    &bridge_tx,
                    generation,
                    ConnectionStatus::Connected,
                    Some(address.clone()),
                )
                .await
                {
                    return;
                }

                match run_session(stream, generation, &mut send_rx, &bridge_tx).await {
                    SessionEnd::Shutdown => return,
                    SessionEnd::Closed => {
                        info!("Matrix at {} closed the connection", address);
                        if !report_status(
                            &bridge_tx,
                            generation,
                            ConnectionStatus::Disconnected,
                            Some("connection closed by peer".to_string()),
                        )
                        .await
                        {
                            return;
                        }
                    }
                    SessionEnd::Failed(message) => {
                        warn!("Network error on {}: {}", address, message);
                        if !report_error(&bridge_tx, generation, message.clone()).await
                            || !report_status(
                                &bridge_tx,
                                generation,
                                ConnectionStatus::Disconnected,
                                Some(message),
                            )
                            .await
                        {
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Network error connecting to {}: {}", address, e);
                if !report_error(&bridge_tx, generation, e.to_string()).await
                    || !report_status(
                        &bridge_tx,
                        generation,
                        ConnectionStatus::Disconnected,
                        Some(e.to_string()),
                    )
                    .await
                {
                    return;
                }
            }
        }

        if !wait_before_retry(reconnect_delay, &mut send_rx).await {
            return;
        }
        debug!("Retrying connection to {}", address);
    }
}

/// Pump one established socket until it ends
async fn run_session(
    mut stream: TcpStream,
    generation: u64,
    send_rx: &mut mpsc::Receiver<Vec<u8>>,
    bridge_tx: &mpsc::WeakSender<BridgeActorCommand>,
) -> SessionEnd {
    let (mut reader, mut writer) = stream.split();
    let mut buf = vec![0u8; READ_BUF_LEN];

    loop {
        tokio::select! {
            data = send_rx.recv() => {
                // The handle owns the only sender, so `None` means it is gone
                let Some(data) = data else {
                    let _ = writer.shutdown().await;
                    return SessionEnd::Shutdown;
                };
                if let Err(e) = writer.write_all(&data).await {
                    return SessionEnd::Failed(e.to_string());
                }
                if let Err(e) = writer.flush().await {
                    return SessionEnd::Failed(e.to_string());
                }
            }

            result = reader.read(&mut buf) => {
                match result {
                    Ok(0) => return SessionEnd::Closed,
                    Ok(n) => {
                        let data = buf[..n].to_vec();
                        debug!("Read {} bytes from matrix: {:?}", n, String::from_utf8_lossy(&data));
                        if !report(bridge_tx, BridgeActorCommand::DeviceData { generation, data }).await {
                            return SessionEnd::Shutdown;
                        }
                    }
                    Err(e) => return SessionEnd::Failed(e.to_string()),
                }
            }
        }
    }
}

/// Sit out the reconnect delay, discarding sends
///
/// Returns false if the task should end instead of retrying.
async fn wait_before_retry(
    reconnect_delay: Option<Duration>,
    send_rx: &mut mpsc::Receiver<Vec<u8>>,
) -> bool {
    let sleep = async {
        match reconnect_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            data = send_rx.recv() => {
                match data {
                    Some(data) => {
                        debug!("Matrix socket not connected, dropping {} bytes", data.len());
                    }
                    None => return false,
                }
            }
        }
    }
}

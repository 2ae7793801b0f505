//! TCP server for a virtual matrix
//!
//! Accepts one controller at a time, like the real device. The routing table
//! survives reconnects, so a controller that reconnects sees whatever the
//! previous session (or the front panel) left behind.

use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::task::{run_virtual_matrix_task, TaskEnd, VirtualMatrixCommand, VirtualMatrixEvent};
use crate::VirtualMatrix;

/// A virtual matrix listening on TCP
pub struct VirtualMatrixServer {
    local_addr: SocketAddr,
    cmd_tx: mpsc::Sender<VirtualMatrixCommand>,
    state_tx: broadcast::Sender<VirtualMatrixEvent>,
    task: JoinHandle<io::Result<VirtualMatrix>>,
}

impl VirtualMatrixServer {
    /// Bind `addr` and start serving `matrix`
    ///
    /// Bind to port 0 to let the OS pick; see [`local_addr`](Self::local_addr).
    pub async fn spawn(addr: impl ToSocketAddrs, matrix: VirtualMatrix) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (state_tx, _) = broadcast::channel(256);

        info!("Virtual matrix {} listening on {}", matrix.id(), local_addr);
        let task = tokio::spawn(serve(listener, matrix, cmd_rx, state_tx.clone()));

        Ok(Self {
            local_addr,
            cmd_tx,
            state_tx,
            task,
        })
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Subscribe to matrix events
    pub fn subscribe(&self) -> broadcast::Receiver<VirtualMatrixEvent> {
        self.state_tx.subscribe()
    }

    /// Send a control command to the matrix
    pub async fn command(&self, cmd: VirtualMatrixCommand) -> io::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "virtual matrix stopped"))
    }

    /// Change routing as if from the front panel
    pub async fn front_panel_route(&self, input: u8, output: u8) -> io::Result<()> {
        self.command(VirtualMatrixCommand::FrontPanelRoute { input, output })
            .await
    }

    /// Stop serving and return the final matrix state
    pub async fn shutdown(self) -> io::Result<VirtualMatrix> {
        let _ = self.cmd_tx.send(VirtualMatrixCommand::Shutdown).await;
        self.task
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }
}

async fn serve(
    listener: TcpListener,
    mut matrix: VirtualMatrix,
    mut cmd_rx: mpsc::Receiver<VirtualMatrixCommand>,
    state_tx: broadcast::Sender<VirtualMatrixEvent>,
) -> io::Result<VirtualMatrix> {
    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                info!("Virtual matrix {} accepted {}", matrix.id(), peer);
                let _ = state_tx.send(VirtualMatrixEvent::ClientConnected {
                    peer: peer.to_string(),
                });
                stream
            }

            // Front-panel changes still apply with nobody connected
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualMatrixCommand::FrontPanelRoute { input, output }) => {
                        if matrix.front_panel_route(input, output) {
                            let _ = state_tx.send(VirtualMatrixEvent::RoutingChanged {
                                routing: matrix.routing(),
                            });
                        }
                    }
                    Some(VirtualMatrixCommand::SendRaw(_)) | Some(VirtualMatrixCommand::DropClient) => {}
                    Some(VirtualMatrixCommand::Shutdown) | None => return Ok(matrix),
                }
                continue;
            }
        };

        let end = run_virtual_matrix_task(stream, &mut matrix, &mut cmd_rx, &state_tx).await;
        let _ = state_tx.send(VirtualMatrixEvent::ClientDisconnected);

        match end {
            Ok(TaskEnd::ClientClosed) => {}
            Ok(TaskEnd::Shutdown) => return Ok(matrix),
            Err(e) => warn!("Virtual matrix {} client error: {}", matrix.id(), e),
        }
    }
}

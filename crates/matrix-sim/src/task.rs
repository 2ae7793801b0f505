//! Virtual matrix actor task
//!
//! Drives a [`VirtualMatrix`] over an async byte stream. The task uses a
//! select! loop to:
//! - Read commands from the stream, decode them and write the replies
//! - Handle control commands (front-panel changes, raw injection, shutdown)
//! - Broadcast what happened for tests and UIs

use std::io;

use matrix_protocol::{CommandCodec, MatrixCommand, ProtocolCodec, PORT_COUNT};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::VirtualMatrix;

/// Commands that can be sent to a virtual matrix task
#[derive(Debug, Clone)]
pub enum VirtualMatrixCommand {
    /// Change routing as if from the front panel (no bytes are sent)
    FrontPanelRoute { input: u8, output: u8 },
    /// Write arbitrary bytes to the connected client
    SendRaw(Vec<u8>),
    /// Close the current client connection
    DropClient,
    /// Shutdown the virtual matrix
    Shutdown,
}

/// Events emitted by a virtual matrix
#[derive(Debug, Clone)]
pub enum VirtualMatrixEvent {
    /// A controller connected
    ClientConnected {
        /// Peer address
        peer: String,
    },
    /// The controller went away
    ClientDisconnected,
    /// A command was decoded from the stream
    CommandReceived(MatrixCommand),
    /// Routing changed
    RoutingChanged {
        /// Routing indexed by output
        routing: [u8; PORT_COUNT],
    },
}

/// Why a task run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEnd {
    /// The stream closed or was dropped on request
    ClientClosed,
    /// Shutdown was requested (or the command channel closed)
    Shutdown,
}

/// Run the virtual matrix over one stream
///
/// The matrix and command channel are borrowed so a server can keep both
/// across successive client connections.
pub async fn run_virtual_matrix_task<S>(
    mut stream: S,
    matrix: &mut VirtualMatrix,
    cmd_rx: &mut mpsc::Receiver<VirtualMatrixCommand>,
    state_tx: &broadcast::Sender<VirtualMatrixEvent>,
) -> io::Result<TaskEnd>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut codec = CommandCodec::new();
    let mut buf = [0u8; 1024];

    info!("Starting virtual matrix task for {}", matrix.id());

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual matrix stream closed for {}", matrix.id());
                        return Ok(TaskEnd::ClientClosed);
                    }
                    Ok(n) => {
                        codec.push_bytes(&buf[..n]);
                        while let Some((cmd, bytes)) = codec.next_command_with_bytes() {
                            debug!(
                                "{} decoded {:?}",
                                matrix.id(),
                                String::from_utf8_lossy(&bytes)
                            );
                            let before = matrix.routing();
                            let reply = matrix.process_command(cmd);
                            let _ = state_tx.send(VirtualMatrixEvent::CommandReceived(cmd));
                            if matrix.routing() != before {
                                let _ = state_tx.send(VirtualMatrixEvent::RoutingChanged {
                                    routing: matrix.routing(),
                                });
                            }
                            if let Some(reply) = reply {
                                stream.write_all(&reply).await?;
                                stream.flush().await?;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Virtual matrix {} stream error: {}", matrix.id(), e);
                        return Err(e);
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualMatrixCommand::FrontPanelRoute { input, output }) => {
                        if matrix.front_panel_route(input, output) {
                            let _ = state_tx.send(VirtualMatrixEvent::RoutingChanged {
                                routing: matrix.routing(),
                            });
                        }
                    }
                    Some(VirtualMatrixCommand::SendRaw(data)) => {
                        stream.write_all(&data).await?;
                        stream.flush().await?;
                    }
                    Some(VirtualMatrixCommand::DropClient) => {
                        info!("Dropping client of virtual matrix {}", matrix.id());
                        return Ok(TaskEnd::ClientClosed);
                    }
                    Some(VirtualMatrixCommand::Shutdown) | None => {
                        info!("Shutdown requested for virtual matrix {}", matrix.id());
                        return Ok(TaskEnd::Shutdown);
                    }
                }
            }
        }
    }
}

//! Per-connection session task
//!
//! One task per accepted connection runs the blocking envelope read loop and
//! dispatches to the router; a companion writer task drains the session
//! outbox to the socket so broadcast fan-out never blocks on peer I/O.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;

use crate::error::CodecError;
use crate::protocol::{self, Envelope};
use crate::server::config::ServerConfig;
use crate::session::registry::Registry;
use crate::session::router::{self, RouteOutcome};
use crate::session::state::Session;

/// Runs one client connection to completion.
///
/// The loop exits on an explicit disconnect, a clean close, or a read
/// failure; all three funnel through the same registry removal and
/// departure broadcast before the socket is torn down.
pub async fn handle_session(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<Registry>,
    config: Arc<ServerConfig>,
) {
    let (read_half, write_half) = stream.into_split();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(write_half, outbox_rx, addr));

    let mut session = Session::new(addr, outbox_tx);
    let mut reader = BufReader::new(read_half);

    loop {
        match protocol::read_envelope(&mut reader).await {
            Ok(Some(envelope)) => {
                debug!("Received from {}: {:?}", addr, envelope.kind);
                match router::route(&registry, &mut session, envelope).await {
                    RouteOutcome::Continue => {}
                    RouteOutcome::Disconnect => break,
                }
            }
            Ok(None) => {
                info!("Connection closed by {}", addr);
                router::disconnect(&registry, &mut session).await;
                break;
            }
            Err(CodecError::Protocol(e)) => {
                warn!("Protocol error from {}: {}; discarding frame", addr, e);
            }
            Err(CodecError::Io(e)) => {
                warn!("Failed to read from {}: {}; treating as disconnect", addr, e);
                router::disconnect(&registry, &mut session).await;
                break;
            }
        }
    }

    // Bounded delay so departure broadcasts already queued on peer outboxes
    // flush before this peer observes a reset. Best-effort, not a guarantee.
    tokio::time::sleep(config.disconnect_linger()).await;

    session.close();
    // Dropping the session closes the outbox; the writer drains what is
    // queued, then shuts the socket down.
    drop(session);
    let _ = writer.await;
}

/// Drains one session's outbox to its socket.
///
/// A write failure usually means the peer already closed its end; it is
/// logged and the remaining queue is still attempted, never retried.
async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut outbox: mpsc::UnboundedReceiver<Envelope>,
    addr: SocketAddr,
) {
    while let Some(envelope) = outbox.recv().await {
        if let Err(e) = protocol::write_envelope(&mut write_half, &envelope).await {
            warn!("Error sending envelope to {}: {}", addr, e);
        }
    }
    let _ = write_half.shutdown().await;
}

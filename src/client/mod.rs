//! Client-side counterpart
//!
//! A single session against one fixed peer, the server: opens the
//! connection, performs the connect handshake, and keeps a read-only local
//! mirror of the destiny set owned by the server's registry.

pub mod event;

pub use event::ClientEvent;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc};

use crate::error::{ClientError, CodecError};
use crate::protocol::{self, Envelope, Kind};

/// Chat body that triggers the close handshake instead of being sent.
pub const DISCONNECT_KEYWORD: &str = "chao";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 2022;

/// Delay between sending the disconnect envelope and closing the socket,
/// mirroring the server's flush linger. Best-effort only.
const CLOSE_LINGER: Duration = Duration::from_millis(1000);

/// Local mirror of the server-side view of this client.
struct ClientState {
    destinies: HashSet<String>,
    last_sender: Option<String>,
    last_body: Option<String>,
    connected: bool,
    closing: bool,
}

/// One client connection to the relay server.
pub struct ChatClient {
    id: String,
    state: Arc<Mutex<ClientState>>,
    events: mpsc::UnboundedSender<ClientEvent>,
    writer: Mutex<OwnedWriteHalf>,
}

impl ChatClient {
    /// Connects to the server and performs the connect handshake.
    ///
    /// A blank host falls back to the default; so does a port below 1024.
    /// Returns the client handle and the event stream for the presentation
    /// layer. A connection failure is reported as `ClientError::Connect`.
    pub async fn connect(
        host: &str,
        port: u16,
        id: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClientEvent>), ClientError> {
        let host = if host.trim().is_empty() { DEFAULT_HOST } else { host };
        let port = if port < 1024 { DEFAULT_PORT } else { port };

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(ClientError::Connect)?;
        let (read_half, mut write_half) = stream.into_split();

        protocol::write_envelope(&mut write_half, &Envelope::connect(id)).await?;

        let state = Arc::new(Mutex::new(ClientState {
            destinies: HashSet::new(),
            last_sender: None,
            last_body: None,
            connected: true,
            closing: false,
        }));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(read_loop(
            BufReader::new(read_half),
            Arc::clone(&state),
            events_tx.clone(),
        ));

        Ok((
            Self {
                id: id.to_string(),
                state,
                events: events_tx,
                writer: Mutex::new(write_half),
            },
            events_rx,
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sends a chat body to another client known to the server.
    ///
    /// A blank destiny makes this a no-op; a body equal to the disconnect
    /// keyword runs the close handshake instead.
    pub async fn send_message(&self, body: &str, destiny: &str) -> Result<(), ClientError> {
        if body.eq_ignore_ascii_case(DISCONNECT_KEYWORD) {
            return self.close().await;
        }
        if destiny.trim().is_empty() {
            return Ok(());
        }
        if !self.is_connected().await {
            return Err(ClientError::NotConnected);
        }

        let envelope = Envelope::chat(&self.id, destiny, body);
        let mut writer = self.writer.lock().await;
        protocol::write_envelope(&mut *writer, &envelope).await?;
        Ok(())
    }

    /// Runs the close handshake: announce the disconnect, give the envelope
    /// a bounded delay to flush, then close the socket. Idempotent.
    pub async fn close(&self) -> Result<(), ClientError> {
        {
            let mut state = self.state.lock().await;
            if state.closing {
                return Ok(());
            }
            state.closing = true;
        }

        let mut writer = self.writer.lock().await;
        if let Err(e) =
            protocol::write_envelope(&mut *writer, &Envelope::disconnect(&self.id)).await
        {
            // The server may already be gone; closing proceeds regardless.
            warn!("Error sending disconnect: {}", e);
        }

        tokio::time::sleep(CLOSE_LINGER).await;
        let _ = writer.shutdown().await;

        mark_disconnected(&self.state, &self.events).await;
        Ok(())
    }

    /// The destiny set last received from the server, sorted.
    pub async fn destinies(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut destinies: Vec<String> = state.destinies.iter().cloned().collect();
        destinies.sort();
        destinies
    }

    /// Sender and body of the most recent inbound chat, if any.
    pub async fn last_message(&self) -> Option<(String, String)> {
        let state = self.state.lock().await;
        match (&state.last_sender, &state.last_body) {
            (Some(sender), Some(body)) => Some((sender.clone(), body.clone())),
            _ => None,
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }
}

/// Flips the liveness flag and emits `Disconnected`, exactly once.
async fn mark_disconnected(
    state: &Mutex<ClientState>,
    events: &mpsc::UnboundedSender<ClientEvent>,
) {
    let mut state = state.lock().await;
    if state.connected {
        state.connected = false;
        let _ = events.send(ClientEvent::Disconnected);
    }
}

/// Blocking read loop applying server envelopes to the local mirror.
async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    state: Arc<Mutex<ClientState>>,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    loop {
        match protocol::read_envelope(&mut reader).await {
            Ok(Some(envelope)) => apply(&state, &events, envelope).await,
            Ok(None) => break,
            Err(CodecError::Protocol(e)) => {
                warn!("Protocol error from server: {}; discarding frame", e);
            }
            Err(CodecError::Io(e)) => {
                if !state.lock().await.closing {
                    warn!("Connection to server lost: {}", e);
                }
                break;
            }
        }
    }
    mark_disconnected(&state, &events).await;
}

/// Applies one server envelope to the cached mirror and notifies observers.
async fn apply(
    state: &Mutex<ClientState>,
    events: &mpsc::UnboundedSender<ClientEvent>,
    envelope: Envelope,
) {
    match envelope.kind {
        Kind::ConnectionAccepted => {
            let mut state = state.lock().await;
            state.destinies = envelope.destinies.unwrap_or_default().into_iter().collect();
            let snapshot = sorted(&state.destinies);
            drop(state);
            let _ = events.send(ClientEvent::DestiniesChanged(snapshot));
        }
        Kind::NewClient => {
            let mut state = state.lock().await;
            state.destinies.insert(envelope.sender);
            let snapshot = sorted(&state.destinies);
            drop(state);
            let _ = events.send(ClientEvent::DestiniesChanged(snapshot));
        }
        Kind::ClientDisconnected => {
            let mut state = state.lock().await;
            state.destinies.remove(&envelope.sender);
            let snapshot = sorted(&state.destinies);
            drop(state);
            let _ = events.send(ClientEvent::DestiniesChanged(snapshot));
        }
        Kind::Chat => {
            // Validated by the codec: a chat envelope carries a body.
            let Some(body) = envelope.body else { return };
            let mut state = state.lock().await;
            state.last_sender = Some(envelope.sender.clone());
            state.last_body = Some(body.clone());
            drop(state);
            let _ = events.send(ClientEvent::MessageReceived {
                sender: envelope.sender,
                body,
            });
        }
        Kind::Connect | Kind::Disconnect => {
            debug!("Ignoring {:?} envelope from server", envelope.kind);
        }
    }
}

fn sorted(destinies: &HashSet<String>) -> Vec<String> {
    let mut snapshot: Vec<String> = destinies.iter().cloned().collect();
    snapshot.sort();
    snapshot
}

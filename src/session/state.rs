//! Session state
//!
//! Server-side state for one accepted connection: identity binding,
//! liveness, and the handle other sessions use to reach its socket.

use std::net::SocketAddr;

use log::warn;
use tokio::sync::mpsc;

use crate::protocol::Envelope;

/// Progress of a session through its lifecycle.
///
/// `Anonymous -> Bound -> Closed`, with no transitions out of `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, but no connect envelope seen yet; not in the registry.
    Anonymous,
    /// Identifier bound after the connect handshake.
    Bound(String),
    /// Torn down.
    Closed,
}

/// One accepted connection, owned by its session task.
pub struct Session {
    addr: SocketAddr,
    state: SessionState,
    outbox: mpsc::UnboundedSender<Envelope>,
}

impl Session {
    pub fn new(addr: SocketAddr, outbox: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            addr,
            state: SessionState::Anonymous,
            outbox,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Returns the bound identifier, if the connect handshake completed.
    pub fn id(&self) -> Option<&str> {
        match &self.state {
            SessionState::Bound(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, SessionState::Bound(_))
    }

    /// Binds the client identifier. Only meaningful while `Anonymous`.
    pub fn bind(&mut self, id: &str) {
        if self.state == SessionState::Anonymous {
            self.state = SessionState::Bound(id.to_string());
        }
    }

    /// Marks the session torn down. Idempotent; `Closed` is terminal.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Enqueues an envelope for this session's socket. Best-effort: a send
    /// after the writer task has gone is logged and dropped.
    pub fn send(&self, envelope: Envelope) {
        if self.outbox.send(envelope).is_err() {
            warn!("Error sending envelope to {}: writer gone", self.addr);
        }
    }

    pub fn outbox(&self) -> &mpsc::UnboundedSender<Envelope> {
        &self.outbox
    }
}

/// Registry-visible handle for a bound session: just enough to address its
/// socket from other session tasks.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    outbox: mpsc::UnboundedSender<Envelope>,
}

impl SessionHandle {
    pub fn new(id: &str, outbox: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            id: id.to_string(),
            outbox,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Enqueues an envelope for delivery. Best-effort: failures mean the
    /// peer is tearing down and are logged, never propagated, so a broadcast
    /// loop cannot be derailed by one dead peer.
    pub fn send(&self, envelope: Envelope) {
        if self.outbox.send(envelope).is_err() {
            warn!("Error sending envelope to {}: writer gone", self.id);
        }
    }
}

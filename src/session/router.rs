//! Envelope routing
//!
//! Applies protocol semantics for one received envelope against the registry
//! and the receiving session. This is where connects, disconnects, and chat
//! relay actually happen.

use log::{debug, info, warn};

use crate::error::RegistryError;
use crate::protocol::{Envelope, Kind};
use crate::session::registry::Registry;
use crate::session::state::{Session, SessionHandle};

/// Tells the session loop how to proceed after an envelope.
#[derive(Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    Continue,
    Disconnect,
}

/// Dispatches one received envelope.
pub async fn route(registry: &Registry, session: &mut Session, envelope: Envelope) -> RouteOutcome {
    match envelope.kind {
        Kind::Connect => handle_connect(registry, session, envelope).await,
        Kind::Disconnect => {
            disconnect(registry, session).await;
            RouteOutcome::Disconnect
        }
        Kind::Chat => handle_chat(registry, session, envelope).await,
        // Server-to-client kinds carry no meaning inbound; ignore them.
        Kind::ConnectionAccepted | Kind::NewClient | Kind::ClientDisconnected => {
            debug!(
                "Ignoring {:?} envelope from {}",
                envelope.kind,
                session.addr()
            );
            RouteOutcome::Continue
        }
    }
}

/// Binds the session's identifier and announces it.
///
/// The member set handed back by the atomic insert is the membership as it
/// was before this session joined: the accept reply must not list the new
/// client as its own peer, and peers may only learn of the new client after
/// it is durably registered and routable.
async fn handle_connect(
    registry: &Registry,
    session: &mut Session,
    envelope: Envelope,
) -> RouteOutcome {
    if session.is_bound() {
        warn!(
            "Duplicate connect from {} ({}); discarding",
            session.addr(),
            envelope.sender
        );
        return RouteOutcome::Continue;
    }

    let id = envelope.sender.trim();
    if id.is_empty() {
        warn!("Connect from {} with blank identifier; discarding", session.addr());
        return RouteOutcome::Continue;
    }

    let handle = SessionHandle::new(id, session.outbox().clone());
    let prior = match registry.add(handle).await {
        Ok(prior) => prior,
        Err(e @ RegistryError::IdTaken(_)) => {
            warn!("Rejecting connect from {}: {}", session.addr(), e);
            return RouteOutcome::Continue;
        }
        Err(e @ RegistryError::Full(_)) => {
            warn!("Refusing connection from {}: {}", session.addr(), e);
            return RouteOutcome::Disconnect;
        }
    };
    session.bind(id);

    let prior_ids: Vec<String> = prior.iter().map(|peer| peer.id().to_string()).collect();
    session.send(Envelope::connection_accepted(id, prior_ids.clone()));

    info!("New client connected: {}", id);

    for peer in &prior {
        let destinies = prior_ids
            .iter()
            .filter(|destiny| destiny.as_str() != peer.id())
            .cloned()
            .collect();
        peer.send(Envelope::new_client(id, destinies));
    }

    RouteOutcome::Continue
}

/// Removes the session from the registry and announces the departure.
///
/// Shared by the explicit disconnect envelope and the implicit path taken on
/// read failure or EOF. Removal happens first so the departing identifier
/// stops being a valid chat destination before anyone hears about it; each
/// remaining peer is then told, with a destiny list that excludes itself.
pub async fn disconnect(registry: &Registry, session: &mut Session) {
    let Some(id) = session.id().map(str::to_string) else {
        debug!("Anonymous session {} closing", session.addr());
        return;
    };

    if registry.remove(&id).await.is_none() {
        return;
    }

    info!("Client {} disconnected", id);

    let remaining = registry.snapshot().await;
    let remaining_ids: Vec<String> = remaining.iter().map(|peer| peer.id().to_string()).collect();

    for peer in &remaining {
        let destinies = remaining_ids
            .iter()
            .filter(|destiny| destiny.as_str() != peer.id())
            .cloned()
            .collect();
        peer.send(Envelope::client_disconnected(&id, destinies));
    }
}

/// Relays a chat envelope, unchanged, to its destiny only.
///
/// A destiny that is no longer registered is a silent drop: the sender is
/// not told. Best-effort delivery is the documented contract.
async fn handle_chat(
    registry: &Registry,
    session: &mut Session,
    envelope: Envelope,
) -> RouteOutcome {
    if !session.is_bound() {
        warn!(
            "Chat from {} before connect handshake; discarding",
            session.addr()
        );
        return RouteOutcome::Continue;
    }

    let Some(destiny) = envelope.destiny.as_deref() else {
        debug!("Chat from {} without destiny; discarding", session.addr());
        return RouteOutcome::Continue;
    };

    match registry.lookup(destiny).await {
        Some(peer) => {
            debug!("Relaying chat {} -> {}", envelope.sender, destiny);
            peer.send(envelope);
        }
        None => {
            debug!(
                "Dropping chat {} -> {}: destiny not connected",
                envelope.sender, destiny
            );
        }
    }

    RouteOutcome::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn session(port: u16) -> (Session, UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr = format!("127.0.0.1:{}", port).parse().unwrap();
        (Session::new(addr, tx), rx)
    }

    async fn connect(
        registry: &Registry,
        id: &str,
        port: u16,
    ) -> (Session, UnboundedReceiver<Envelope>) {
        let (mut s, rx) = session(port);
        let outcome = route(registry, &mut s, Envelope::connect(id)).await;
        assert_eq!(outcome, RouteOutcome::Continue);
        (s, rx)
    }

    fn sorted(mut ids: Vec<String>) -> Vec<String> {
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn accept_reply_reflects_membership_before_own_addition() {
        let registry = Registry::new(16);

        let (_a, mut rx_a) = connect(&registry, "alice", 1).await;
        let accept = rx_a.recv().await.unwrap();
        assert_eq!(accept.kind, Kind::ConnectionAccepted);
        assert_eq!(accept.destinies, Some(vec![]));

        let (_b, mut rx_b) = connect(&registry, "bob", 2).await;
        let accept = rx_b.recv().await.unwrap();
        assert_eq!(accept.kind, Kind::ConnectionAccepted);
        assert_eq!(accept.destinies, Some(vec!["alice".to_string()]));
    }

    #[tokio::test]
    async fn peers_get_one_new_client_broadcast_excluding_themselves() {
        let registry = Registry::new(16);

        let (_a, mut rx_a) = connect(&registry, "alice", 1).await;
        let (_b, mut rx_b) = connect(&registry, "bob", 2).await;
        let (_c, mut rx_c) = connect(&registry, "carol", 3).await;

        rx_a.recv().await.unwrap(); // own accept
        rx_b.recv().await.unwrap();
        rx_c.recv().await.unwrap();

        let seen_by_a = rx_a.recv().await.unwrap();
        assert_eq!(seen_by_a.kind, Kind::NewClient);
        assert_eq!(seen_by_a.sender, "bob");
        assert_eq!(seen_by_a.destinies, Some(vec![]));

        let seen_by_a = rx_a.recv().await.unwrap();
        assert_eq!(seen_by_a.sender, "carol");
        assert_eq!(seen_by_a.destinies, Some(vec!["bob".to_string()]));

        let seen_by_b = rx_b.recv().await.unwrap();
        assert_eq!(seen_by_b.kind, Kind::NewClient);
        assert_eq!(seen_by_b.sender, "carol");
        assert_eq!(seen_by_b.destinies, Some(vec!["alice".to_string()]));

        // Nothing further queued for the new client itself.
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn duplicate_identifier_leaves_session_anonymous() {
        let registry = Registry::new(16);
        let (_a, _rx_a) = connect(&registry, "alice", 1).await;

        let (mut impostor, mut rx) = session(2);
        let outcome = route(&registry, &mut impostor, Envelope::connect("alice")).await;
        assert_eq!(outcome, RouteOutcome::Continue);
        assert!(!impostor.is_bound());
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn connect_at_capacity_is_refused() {
        let registry = Registry::new(1);
        let (_a, _rx_a) = connect(&registry, "alice", 1).await;

        let (mut late, _rx) = session(2);
        let outcome = route(&registry, &mut late, Envelope::connect("bob")).await;
        assert_eq!(outcome, RouteOutcome::Disconnect);
        assert!(!late.is_bound());
    }

    #[tokio::test]
    async fn chat_reaches_the_destiny_only() {
        let registry = Registry::new(16);
        let (mut a, _rx_a) = connect(&registry, "alice", 1).await;
        let (_b, mut rx_b) = connect(&registry, "bob", 2).await;
        let (_c, mut rx_c) = connect(&registry, "carol", 3).await;

        rx_b.recv().await.unwrap(); // accept
        rx_c.recv().await.unwrap(); // accept
        rx_b.recv().await.unwrap(); // carol joined

        let outcome = route(&registry, &mut a, Envelope::chat("alice", "carol", "hi")).await;
        assert_eq!(outcome, RouteOutcome::Continue);

        let delivered = rx_c.recv().await.unwrap();
        assert_eq!(delivered.kind, Kind::Chat);
        assert_eq!(delivered.sender, "alice");
        assert_eq!(delivered.body.as_deref(), Some("hi"));

        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn chat_to_unknown_destiny_is_dropped_silently() {
        let registry = Registry::new(16);
        let (mut a, mut rx_a) = connect(&registry, "alice", 1).await;
        rx_a.recv().await.unwrap(); // accept

        let outcome = route(&registry, &mut a, Envelope::chat("alice", "nobody", "hi")).await;
        assert_eq!(outcome, RouteOutcome::Continue);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn chat_while_anonymous_is_discarded() {
        let registry = Registry::new(16);
        let (_b, mut rx_b) = connect(&registry, "bob", 2).await;
        rx_b.recv().await.unwrap(); // accept

        let (mut anon, _rx) = session(1);
        let outcome = route(&registry, &mut anon, Envelope::chat("ghost", "bob", "boo")).await;
        assert_eq!(outcome, RouteOutcome::Continue);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_broadcast_excludes_each_recipient() {
        let registry = Registry::new(16);
        let (_a, mut rx_a) = connect(&registry, "alice", 1).await;
        let (mut b, _rx_b) = connect(&registry, "bob", 2).await;
        let (_c, mut rx_c) = connect(&registry, "carol", 3).await;

        rx_a.recv().await.unwrap(); // accept
        rx_a.recv().await.unwrap(); // bob joined
        rx_a.recv().await.unwrap(); // carol joined
        rx_c.recv().await.unwrap(); // accept

        let outcome = route(&registry, &mut b, Envelope::disconnect("bob")).await;
        assert_eq!(outcome, RouteOutcome::Disconnect);
        assert!(registry.lookup("bob").await.is_none());

        let seen_by_a = rx_a.recv().await.unwrap();
        assert_eq!(seen_by_a.kind, Kind::ClientDisconnected);
        assert_eq!(seen_by_a.sender, "bob");
        assert_eq!(seen_by_a.destinies, Some(vec!["carol".to_string()]));

        let seen_by_c = rx_c.recv().await.unwrap();
        assert_eq!(seen_by_c.kind, Kind::ClientDisconnected);
        assert_eq!(seen_by_c.sender, "bob");
        assert_eq!(seen_by_c.destinies, Some(vec!["alice".to_string()]));
    }

    #[tokio::test]
    async fn implicit_disconnect_matches_the_explicit_path() {
        let registry = Registry::new(16);
        let (mut a, _rx_a) = connect(&registry, "alice", 1).await;
        let (_b, mut rx_b) = connect(&registry, "bob", 2).await;
        rx_b.recv().await.unwrap(); // accept

        // Read failure path: the handler calls disconnect() directly.
        disconnect(&registry, &mut a).await;
        assert!(registry.lookup("alice").await.is_none());

        let seen_by_b = rx_b.recv().await.unwrap();
        assert_eq!(seen_by_b.kind, Kind::ClientDisconnected);
        assert_eq!(seen_by_b.sender, "alice");

        // A second teardown of the same session broadcasts nothing.
        disconnect(&registry, &mut a).await;
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn connect_after_departure_reuses_the_identifier() {
        let registry = Registry::new(16);
        let (mut a, _rx_a) = connect(&registry, "alice", 1).await;
        route(&registry, &mut a, Envelope::disconnect("alice")).await;

        let (_a2, mut rx_a2) = connect(&registry, "alice", 3).await;
        let accept = rx_a2.recv().await.unwrap();
        assert_eq!(accept.kind, Kind::ConnectionAccepted);
        assert_eq!(sorted(registry.snapshot_ids().await), vec!["alice".to_string()]);
    }
}

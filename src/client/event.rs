//! Client-side change notifications
//!
//! The presentation layer consumes these from a channel instead of wiring
//! listener objects; each event reports a state change in the local mirror.

/// State change observed by a connected client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The cached destiny set changed; carries the new set, sorted.
    DestiniesChanged(Vec<String>),
    /// A chat body arrived from another client.
    MessageReceived { sender: String, body: String },
    /// The connection ended, by either side.
    Disconnected,
}

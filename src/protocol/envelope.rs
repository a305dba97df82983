//! Module `envelope`
//!
//! Defines the message envelope exchanged between client and server and the
//! set of actions it can carry.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Action carried by an envelope.
///
/// The wire tags are the protocol vocabulary both sides agree on; the
/// discriminator stays stable across implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    /// Client asks the server to bind its identifier. Client to server.
    #[serde(rename = "connect")]
    Connect,
    /// Client announces it is leaving. Client to server.
    #[serde(rename = "disconnect")]
    Disconnect,
    /// Point-to-point chat text. Either direction; the server relays.
    #[serde(rename = "message")]
    Chat,
    /// Server confirms a connect and reports the current peer set.
    #[serde(rename = "connection-accept")]
    ConnectionAccepted,
    /// Server tells existing clients about a new peer.
    #[serde(rename = "new-client")]
    NewClient,
    /// Server tells remaining clients about a departed peer.
    #[serde(rename = "disconnect-client")]
    ClientDisconnected,
}

/// The only unit ever exchanged on the wire.
///
/// Exactly one semantic purpose per envelope: fields that are not meaningful
/// for a given `kind` are absent, never partially populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: Kind,
    pub sender: String,
    /// Addressee of a chat message. Chat only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destiny: Option<String>,
    /// Chat text. Chat only.
    #[serde(rename = "message", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Peer identifiers, order irrelevant. Membership envelopes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destinies: Option<Vec<String>>,
}

impl Envelope {
    pub fn connect(sender: &str) -> Self {
        Self {
            kind: Kind::Connect,
            sender: sender.to_string(),
            destiny: None,
            body: None,
            destinies: None,
        }
    }

    pub fn disconnect(sender: &str) -> Self {
        Self {
            kind: Kind::Disconnect,
            sender: sender.to_string(),
            destiny: None,
            body: None,
            destinies: None,
        }
    }

    pub fn chat(sender: &str, destiny: &str, body: &str) -> Self {
        Self {
            kind: Kind::Chat,
            sender: sender.to_string(),
            destiny: Some(destiny.to_string()),
            body: Some(body.to_string()),
            destinies: None,
        }
    }

    pub fn connection_accepted(sender: &str, destinies: Vec<String>) -> Self {
        Self::membership(Kind::ConnectionAccepted, sender, destinies)
    }

    pub fn new_client(sender: &str, destinies: Vec<String>) -> Self {
        Self::membership(Kind::NewClient, sender, destinies)
    }

    pub fn client_disconnected(sender: &str, destinies: Vec<String>) -> Self {
        Self::membership(Kind::ClientDisconnected, sender, destinies)
    }

    fn membership(kind: Kind, sender: &str, destinies: Vec<String>) -> Self {
        Self {
            kind,
            sender: sender.to_string(),
            destiny: None,
            body: None,
            destinies: Some(destinies),
        }
    }

    /// Checks that every field required by this envelope's `kind` is present.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.kind == Kind::Chat {
            if self.destiny.is_none() {
                return Err(ProtocolError::MissingField("destiny"));
            }
            if self.body.is_none() {
                return Err(ProtocolError::MissingField("message"));
            }
        }
        Ok(())
    }
}

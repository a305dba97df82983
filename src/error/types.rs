//! Error types
//!
//! Defines domain-specific error types for each module of the chat relay.

use std::fmt;
use std::io;

/// Protocol-level errors: a complete frame was received but cannot be
/// interpreted. These never tear a session down on their own; the offending
/// frame is discarded with a logged warning and the session remains open.
#[derive(Debug)]
pub enum ProtocolError {
    Json(serde_json::Error),
    FrameTooLong(usize),
    MissingField(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Json(e) => write!(f, "Malformed envelope: {}", e),
            ProtocolError::FrameTooLong(len) => {
                write!(f, "Frame of {} bytes exceeds maximum length", len)
            }
            ProtocolError::MissingField(field) => {
                write!(f, "Missing required field: {}", field)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<serde_json::Error> for ProtocolError {
    fn from(error: serde_json::Error) -> Self {
        ProtocolError::Json(error)
    }
}

/// Transport and framing errors raised while reading or writing envelopes.
#[derive(Debug)]
pub enum CodecError {
    Io(io::Error),
    Protocol(ProtocolError),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Io(e) => write!(f, "I/O error: {}", e),
            CodecError::Protocol(e) => write!(f, "Protocol error: {}", e),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<io::Error> for CodecError {
    fn from(error: io::Error) -> Self {
        CodecError::Io(error)
    }
}

impl From<ProtocolError> for CodecError {
    fn from(error: ProtocolError) -> Self {
        CodecError::Protocol(error)
    }
}

/// Registry module errors
#[derive(Debug)]
pub enum RegistryError {
    IdTaken(String),
    Full(usize),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::IdTaken(id) => {
                write!(f, "Identifier already bound to a live session: {}", id)
            }
            RegistryError::Full(max) => write!(f, "Registry full: {} clients", max),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Client module errors
#[derive(Debug)]
pub enum ClientError {
    Connect(io::Error),
    Codec(CodecError),
    NotConnected,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Connect(e) => write!(f, "Cannot connect to server: {}", e),
            ClientError::Codec(e) => write!(f, "Connection error: {}", e),
            ClientError::NotConnected => write!(f, "Client is not connected"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<CodecError> for ClientError {
    fn from(error: CodecError) -> Self {
        ClientError::Codec(error)
    }
}

/// General relay error that encompasses all error types
#[derive(Debug)]
pub enum RelayError {
    Protocol(ProtocolError),
    Codec(CodecError),
    Registry(RegistryError),
    Client(ClientError),
    Config(config::ConfigError),
    Bind(io::Error),
    Io(io::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Protocol(e) => write!(f, "Protocol error: {}", e),
            RelayError::Codec(e) => write!(f, "Codec error: {}", e),
            RelayError::Registry(e) => write!(f, "Registry error: {}", e),
            RelayError::Client(e) => write!(f, "Client error: {}", e),
            RelayError::Config(e) => write!(f, "Configuration error: {}", e),
            RelayError::Bind(e) => write!(f, "Failed to bind listener: {}", e),
            RelayError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<ProtocolError> for RelayError {
    fn from(error: ProtocolError) -> Self {
        RelayError::Protocol(error)
    }
}

impl From<CodecError> for RelayError {
    fn from(error: CodecError) -> Self {
        RelayError::Codec(error)
    }
}

impl From<RegistryError> for RelayError {
    fn from(error: RegistryError) -> Self {
        RelayError::Registry(error)
    }
}

impl From<ClientError> for RelayError {
    fn from(error: ClientError) -> Self {
        RelayError::Client(error)
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(error: config::ConfigError) -> Self {
        RelayError::Config(error)
    }
}

impl From<io::Error> for RelayError {
    fn from(error: io::Error) -> Self {
        RelayError::Io(error)
    }
}

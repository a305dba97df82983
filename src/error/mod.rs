//! Error handling
//!
//! Defines error types and handling for the chat relay.

pub mod types;

pub use types::*;

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;

pub use client::ChatClient;
pub use server::Server;

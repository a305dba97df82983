//! Server configuration
//!
//! Manages server configuration settings and loading.

use std::time::Duration;

use serde::Deserialize;

/// Port the relay listens on when none is configured.
pub const DEFAULT_PORT: u16 = 2022;

/// Server configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_clients: usize,
    pub disconnect_linger_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_clients: 64,
            disconnect_linger_ms: 1000,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `config/relay.toml` (optional) with
    /// `RELAY_`-prefixed environment variables taking precedence.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("config/relay").required(false))
            .add_source(config::Environment::with_prefix("RELAY"))
            .build()?
            .try_deserialize()
    }

    /// Address the listener binds to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Delay between a session's departure broadcast and its socket close.
    pub fn disconnect_linger(&self) -> Duration {
        Duration::from_millis(self.disconnect_linger_ms)
    }
}

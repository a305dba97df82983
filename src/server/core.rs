//! Server core
//!
//! Binds the listening socket and runs the accept loop, spawning one
//! session task per connection.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpListener;

use crate::error::RelayError;
use crate::server::config::ServerConfig;
use crate::session::registry::Registry;
use crate::session::handle_session;

pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Binds the listener. A bind failure is fatal to the server process.
    pub async fn new(config: ServerConfig) -> Result<Self, RelayError> {
        let addr = config.socket_addr();
        let listener = TcpListener::bind(&addr).await.map_err(RelayError::Bind)?;
        info!("Server bound to {}", listener.local_addr()?);

        Ok(Self {
            listener,
            registry: Arc::new(Registry::new(config.max_clients)),
            config: Arc::new(config),
        })
    }

    /// The actual bound address; useful when configured with port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn start(self) {
        info!(
            "Starting chat relay on {} (max {} clients)",
            self.config.socket_addr(),
            self.config.max_clients
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("Accepted connection from {}", addr);
                    let registry = Arc::clone(&self.registry);
                    let config = Arc::clone(&self.config);

                    // Spawn a task per client so the accept loop never blocks
                    tokio::spawn(async move {
                        handle_session(stream, addr, registry, config).await;
                    });
                }
                Err(e) => {
                    // A dead listener ends the accept loop; established
                    // sessions keep running on their own tasks.
                    error!("Error accepting connection: {}", e);
                    break;
                }
            }
        }
    }
}

//! Echo server: accepts stream connections and echoes each one.
//!
//! Every accepted connection gets its own task running the echo handler,
//! so clients are served independently and the accept loop never waits
//! on a client. Handler failures are logged and confined to their own
//! connection unless the server runs in strict mode.

use std::io;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{EchoError, ServerError};
use crate::protocols::echo;
use crate::transport::{Endpoint, Listener};

/// Server instance
pub struct Server {
    config: ServerConfig,
    listener: Listener,
    connection_limit: Option<Arc<Semaphore>>,
}

impl Server {
    /// Bind the listening endpoint.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        debug!(endpoint = %config.listen, "Opening listener");

        let listener = Listener::bind(&config.listen)
            .await
            .map_err(|source| ServerError::Listen {
                endpoint: config.listen.to_string(),
                source,
            })?;

        let connection_limit = config
            .max_connections
            .map(|max| Arc::new(Semaphore::new(max)));

        Ok(Server {
            config,
            listener,
            connection_limit,
        })
    }

    /// Address actually bound, including an OS-assigned port.
    pub fn local_addr(&self) -> io::Result<Endpoint> {
        self.listener.local_addr()
    }

    /// Accept connections until the listener fails, or until a handler
    /// fails in strict mode. The listener is closed when this returns.
    pub async fn run(mut self) -> Result<(), ServerError> {
        match self.local_addr() {
            Ok(addr) => info!(address = %addr, "Server listening"),
            Err(e) => warn!(error = %e, "Could not read listening address"),
        }

        // Only strict mode ever sends on this
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<EchoError>();

        loop {
            // Wait for a connection slot
            let permit = match &self.connection_limit {
                Some(limit) => tokio::select! {
                    permit = Arc::clone(limit).acquire_owned() => permit.ok(),
                    Some(e) = fatal_rx.recv() => return Err(ServerError::Echo(e)),
                },
                None => None,
            };

            let conn = tokio::select! {
                accepted = self.listener.accept() => accepted.map_err(ServerError::Accept)?,
                Some(e) = fatal_rx.recv() => return Err(ServerError::Echo(e)),
            };

            debug!(peer = %conn.peer_addr, "New connection");

            let timeout = self.config.timeout;
            let fatal_tx = self.config.strict.then(|| fatal_tx.clone());

            tokio::spawn(async move {
                match echo::handle_connection(conn.stream, &conn.peer_addr, timeout).await {
                    Ok(bytes) => {
                        debug!(peer = %conn.peer_addr, bytes, "Echoed bytes to client");
                    }
                    Err(e) => match fatal_tx {
                        Some(tx) => {
                            error!(error = %e, "Connection error");
                            let _ = tx.send(e);
                        }
                        None => warn!(error = %e, "Connection error"),
                    },
                }
                drop(permit);
            });
        }
    }
}

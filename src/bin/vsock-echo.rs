//! Echo service listening on VM sockets (or TCP).

use tracing::debug;
use vsock_echo::config::ServerConfig;
use vsock_echo::logging;
use vsock_echo::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;

    logging::init(&config.log_level);

    debug!(
        endpoint = %config.listen,
        max_connections = ?config.max_connections,
        timeout = ?config.timeout,
        strict = config.strict,
        "Starting vsock-echo"
    );

    let server = Server::bind(config).await?;
    server.run().await?;

    Ok(())
}

//! Ping-like utility that sends test data to an echo server and reports
//! each round trip.

use std::io;
use tracing::debug;
use vsock_echo::config::ProbeConfig;
use vsock_echo::logging;
use vsock_echo::protocols::ping::Prober;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration; a bad pattern fails here, before any dial
    let config = ProbeConfig::load()?;

    logging::init(&config.log_level);

    if let Some(pattern) = &config.pattern {
        debug!(pattern = %pattern, "Using fixed pattern");
    }

    debug!(
        remote = %config.remote,
        count = config.count,
        interval = ?config.interval,
        verify = config.verify,
        "Starting vsock-ping"
    );

    let prober = Prober::new(&config);
    let summary = prober
        .connect_and_run(&config.remote, &mut io::stdout().lock())
        .await?;

    debug!(
        sent = summary.sent,
        received_bytes = summary.received_bytes,
        mismatches = summary.mismatches,
        "Done"
    );

    Ok(())
}

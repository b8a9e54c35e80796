//! Echo handler for one accepted connection.

use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::error::EchoError;
use crate::protocols::with_timeout;

/// Read buffer size
const BUFFER_SIZE: usize = 16 * 1024;

/// Copy every byte read from `stream` back to it until the peer closes.
///
/// Bytes are written back in the chunks they were read in. Returns the
/// total number of bytes echoed. `timeout` bounds each individual read
/// and write; `None` waits forever.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: &str,
    timeout: Option<Duration>,
) -> Result<u64, EchoError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
    let mut echoed: u64 = 0;

    loop {
        buffer.clear();

        let n = with_timeout(timeout, stream.read_buf(&mut buffer))
            .await
            .map_err(|_| timed_out(peer, timeout))?
            .map_err(|source| EchoError::Read {
                peer: peer.to_string(),
                source,
            })?;

        if n == 0 {
            trace!(peer, "Connection closed by client");
            break;
        }

        with_timeout(timeout, stream.write_all(&buffer[..n]))
            .await
            .map_err(|_| timed_out(peer, timeout))?
            .map_err(|source| EchoError::Write {
                peer: peer.to_string(),
                source,
            })?;

        echoed += n as u64;
    }

    // The peer may already be fully gone; nothing left to deliver either way
    if let Err(e) = stream.shutdown().await {
        debug!(peer, error = %e, "Shutdown after EOF failed");
    }

    Ok(echoed)
}

fn timed_out(peer: &str, timeout: Option<Duration>) -> EchoError {
    EchoError::Timeout {
        peer: peer.to_string(),
        timeout: timeout.unwrap_or_default(),
    }
}

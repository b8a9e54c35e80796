//! Round-trip prober.
//!
//! Owns one outbound connection and runs strictly sequential probes over
//! it: write payload, single read, optional verify, report, wait for the
//! next tick. The connection is dropped (closed) on every exit path.

use bytes::Bytes;
use std::fmt;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, trace, warn};

use super::payload::{Payload, MAX_PAYLOAD_SIZE};
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::protocols::with_timeout;
use crate::transport::{self, Endpoint};

/// Result of one probe, reported immediately and then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub seq: u64,
    /// Bytes returned by the single read
    pub received: usize,
    pub remote: String,
    /// `None` when verification is disabled
    pub verified: Option<bool>,
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes from {}: ping_seq={}",
            self.received, self.remote, self.seq
        )?;
        if self.verified == Some(false) {
            write!(f, " verify=FAILED")?;
        }
        Ok(())
    }
}

/// Totals over a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    pub sent: u64,
    pub received_bytes: u64,
    pub mismatches: u64,
}

/// Sends probes according to a [`ProbeConfig`].
#[derive(Debug, Clone)]
pub struct Prober {
    count: u64,
    interval: Duration,
    payload: Payload,
    verify: bool,
    timeout: Option<Duration>,
}

impl Prober {
    pub fn new(config: &ProbeConfig) -> Self {
        Prober {
            count: config.count,
            interval: config.interval,
            payload: config.payload.clone(),
            verify: config.verify,
            timeout: config.timeout,
        }
    }

    /// Dial `remote` and probe it, writing one report line per probe to `out`.
    pub async fn connect_and_run<W: Write>(
        &self,
        remote: &Endpoint,
        out: &mut W,
    ) -> Result<ProbeSummary, ProbeError> {
        let conn = transport::connect(remote)
            .await
            .map_err(|source| ProbeError::Dial {
                endpoint: remote.to_string(),
                source,
            })?;

        debug!("PING {} FROM {}", conn.peer_addr, conn.local_addr);

        self.run(conn.stream, &conn.peer_addr, out).await
    }

    /// Probe over an established stream. Consumes the stream so it is
    /// closed when this returns, successfully or not.
    pub async fn run<S, W>(
        &self,
        mut stream: S,
        remote: &str,
        out: &mut W,
    ) -> Result<ProbeSummary, ProbeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        W: Write,
    {
        let mut buf = [0u8; MAX_PAYLOAD_SIZE];
        let mut ticker = self.ticker();
        let mut summary = ProbeSummary::default();
        let mut seq: u64 = 0;

        while self.count == 0 || seq < self.count {
            let payload = self.payload.generate(seq);

            self.send(&mut stream, seq, &payload).await?;
            let n = self.receive(&mut stream, seq, &mut buf).await?;

            let received = &buf[..n];
            let verified = self.verify.then(|| received == &payload[..]);
            if verified == Some(false) {
                warn!(
                    seq,
                    sent = %hex::encode(&payload),
                    received = %hex::encode(received),
                    "Echoed data does not match sent data"
                );
                summary.mismatches += 1;
            }

            let report = ProbeReport {
                seq,
                received: n,
                remote: remote.to_string(),
                verified,
            };
            writeln!(out, "{report}").map_err(ProbeError::Report)?;
            out.flush().map_err(ProbeError::Report)?;

            summary.sent += 1;
            summary.received_bytes += n as u64;
            seq += 1;

            if let Some(ticker) = ticker.as_mut() {
                ticker.tick().await;
            }
        }

        Ok(summary)
    }

    /// Periodic clock for probe starts. The first tick is one interval
    /// after the run begins; missed ticks are skipped so a slow probe
    /// does not shift the ones after it.
    fn ticker(&self) -> Option<Interval> {
        if self.interval.is_zero() {
            return None;
        }
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Some(ticker)
    }

    async fn send<S>(&self, stream: &mut S, seq: u64, payload: &Bytes) -> Result<(), ProbeError>
    where
        S: AsyncWrite + Unpin,
    {
        trace!(seq, len = payload.len(), "Sending probe");
        with_timeout(self.timeout, stream.write_all(payload))
            .await
            .map_err(|_| self.timed_out("write", seq))?
            .map_err(|source| ProbeError::Write { seq, source })
    }

    /// One read call; a short read is returned as-is.
    async fn receive<S>(
        &self,
        stream: &mut S,
        seq: u64,
        buf: &mut [u8],
    ) -> Result<usize, ProbeError>
    where
        S: AsyncRead + Unpin,
    {
        let n = with_timeout(self.timeout, stream.read(buf))
            .await
            .map_err(|_| self.timed_out("read", seq))?
            .map_err(|source| ProbeError::Read { seq, source })?;

        if n == 0 {
            return Err(ProbeError::ConnectionClosed { seq });
        }
        Ok(n)
    }

    fn timed_out(&self, op: &'static str, seq: u64) -> ProbeError {
        ProbeError::Timeout {
            op,
            seq,
            timeout: self.timeout.unwrap_or_default(),
        }
    }
}

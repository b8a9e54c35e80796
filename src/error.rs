//! Error types for the prober and the echo responder.
//!
//! Every I/O failure surfaces as one of these variants; nothing is
//! retried or skipped silently. Verification mismatches are not errors
//! and are carried on the probe report instead.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::protocols::ping::MAX_PAYLOAD_SIZE;

/// Configuration loading and validation errors.
///
/// All of these are detected before any connection is attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    FileRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid duration '{0}': {1}")]
    Duration(String, #[source] humantime::DurationError),

    #[error("pattern must be specified as hex digits: {0}")]
    InvalidPattern(#[from] hex::FromHexError),

    #[error("pattern is {0} bytes, maximum is {max}", max = MAX_PAYLOAD_SIZE)]
    PatternTooLong(usize),

    #[error("Invalid {transport} address '{addr}': {reason}")]
    Address {
        transport: &'static str,
        addr: String,
        reason: String,
    },
}

/// Fatal errors on the prober side.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to dial {endpoint}: {source}")]
    Dial {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("error writing to socket at ping_seq={seq}: {source}")]
    Write {
        seq: u64,
        #[source]
        source: io::Error,
    },

    #[error("error reading from socket at ping_seq={seq}: {source}")]
    Read {
        seq: u64,
        #[source]
        source: io::Error,
    },

    #[error("connection closed by peer at ping_seq={seq}")]
    ConnectionClosed { seq: u64 },

    #[error("{op} timed out after {timeout:?} at ping_seq={seq}")]
    Timeout {
        op: &'static str,
        seq: u64,
        timeout: Duration,
    },

    #[error("failed to write report: {0}")]
    Report(#[source] io::Error),
}

/// Error from a single echo handler. Scoped to one connection.
#[derive(Debug, Error)]
pub enum EchoError {
    #[error("failed to read from client {peer}: {source}")]
    Read {
        peer: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to echo data to client {peer}: {source}")]
    Write {
        peer: String,
        #[source]
        source: io::Error,
    },

    #[error("client {peer} idle for longer than {timeout:?}")]
    Timeout { peer: String, timeout: Duration },
}

/// Fatal errors on the responder side.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to listen on {endpoint}: {source}")]
    Listen {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),

    #[error("echo handler failed in strict mode: {0}")]
    Echo(#[from] EchoError),
}

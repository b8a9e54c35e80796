//! vsock-echo: round-trip diagnostics for stream transports
//!
//! Two halves that only talk over the wire:
//! - `vsock-ping`: dials an endpoint, sends a payload per tick, reads the
//!   echo back, and prints one line per probe
//! - `vsock-echo`: accepts connections and mirrors every byte back to the
//!   sender until it hangs up
//!
//! Features:
//! - VM sockets (context ID + port) with a TCP fallback
//! - Derived (MD5 of the sequence number) or fixed hex payloads
//! - Optional echo verification, I/O deadlines, and client caps
//! - Configuration via CLI arguments or TOML file

pub mod config;
pub mod error;
pub mod logging;
pub mod protocols;
pub mod server;
pub mod transport;

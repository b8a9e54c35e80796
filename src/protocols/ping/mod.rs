//! Ping protocol implementation.
//!
//! A round-trip probe over a raw byte stream. No headers, no framing:
//! - Client sends: one payload of at most 64 bytes
//! - Server (an echo responder) sends the same bytes back
//!
//! ## Payloads
//!
//! By default the payload for probe `i` is the MD5 digest of `i` encoded
//! as a little-endian `u64`, so every probe carries different but
//! reproducible bytes. A fixed hex pattern can be configured instead.
//!
//! ## Reads
//!
//! The client issues exactly one read per probe. A short read is reported
//! as-is rather than accumulated to the payload length, so a transport
//! that splits the echo shows up as a smaller byte count (and a failed
//! verification when `verify` is enabled).

pub mod payload;
pub mod prober;

pub use payload::{Payload, MAX_PAYLOAD_SIZE};
pub use prober::{ProbeReport, ProbeSummary, Prober};

//! Echo service.
//!
//! Every byte received on a connection is written back to the same
//! connection, unmodified, until the peer closes it. There is no framing:
//!
//! ```text
//! Client sends:  00 ff 01
//! Server sends:  00 ff 01
//! ```
//!
//! Used as the remote end of `vsock-ping` to check that a stream
//! transport delivers bytes intact in both directions.

pub mod handler;

pub use handler::handle_connection;

//! Stream transports used by the prober and the responder.
//!
//! Backends:
//! - `vsock`: VM sockets addressed by context ID and port (Linux only)
//! - `tcp`: loopback/LAN fallback addressed by host and port
//!
//! Both produce a [`Connection`] that owns a boxed byte stream, so the
//! prober and echo handler never see which backend is in use.

mod tcp;
#[cfg(target_os = "linux")]
mod vsock;

use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ConfigError;

/// Any reliable, ordered, bidirectional byte stream.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Stream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Transport selected on the command line or in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Vsock,
    Tcp,
}

/// Address of a remote peer or of a local listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Vsock { cid: u32, port: u32 },
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    /// Build an endpoint for `kind`. `cid` is ignored for TCP and `host`
    /// is ignored for vsock.
    pub fn new(
        kind: TransportKind,
        cid: u32,
        host: &str,
        port: u32,
    ) -> Result<Self, ConfigError> {
        match kind {
            TransportKind::Vsock => Ok(Endpoint::Vsock { cid, port }),
            TransportKind::Tcp => {
                let port = u16::try_from(port).map_err(|_| ConfigError::Address {
                    transport: "tcp",
                    addr: format!("{host}:{port}"),
                    reason: "port must be at most 65535".to_string(),
                })?;
                Ok(Endpoint::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Vsock { cid, port } => write!(f, "vsock:{cid}:{port}"),
            // Bracket IPv6 literals so the port stays unambiguous
            Endpoint::Tcp { host, port } if host.contains(':') && !host.starts_with('[') => {
                write!(f, "[{host}]:{port}")
            }
            Endpoint::Tcp { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

/// One established stream, owned by exactly one task.
///
/// The underlying socket is closed when the connection is dropped.
pub struct Connection {
    pub stream: Box<dyn Stream>,
    pub local_addr: String,
    pub peer_addr: String,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("local_addr", &self.local_addr)
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}

/// Dial `endpoint` and return the established connection.
pub async fn connect(endpoint: &Endpoint) -> io::Result<Connection> {
    match endpoint {
        Endpoint::Tcp { host, port } => tcp::connect(host, *port).await,
        #[cfg(target_os = "linux")]
        Endpoint::Vsock { cid, port } => vsock::connect(*cid, *port).await,
        #[cfg(not(target_os = "linux"))]
        Endpoint::Vsock { .. } => Err(unsupported()),
    }
}

/// A bound listening endpoint. Closed when dropped.
pub enum Listener {
    Tcp(tcp::Listener),
    #[cfg(target_os = "linux")]
    Vsock(vsock::Listener),
}

impl Listener {
    /// Bind to `endpoint`. Port 0 asks the OS to pick a free port.
    pub async fn bind(endpoint: &Endpoint) -> io::Result<Self> {
        match endpoint {
            Endpoint::Tcp { host, port } => {
                Ok(Listener::Tcp(tcp::Listener::bind(host, *port).await?))
            }
            #[cfg(target_os = "linux")]
            Endpoint::Vsock { port, .. } => Ok(Listener::Vsock(vsock::Listener::bind(*port)?)),
            #[cfg(not(target_os = "linux"))]
            Endpoint::Vsock { .. } => Err(unsupported()),
        }
    }

    /// Wait for the next incoming connection.
    pub async fn accept(&mut self) -> io::Result<Connection> {
        match self {
            Listener::Tcp(l) => l.accept().await,
            #[cfg(target_os = "linux")]
            Listener::Vsock(l) => l.accept().await,
        }
    }

    /// Address actually bound, including an OS-assigned port.
    pub fn local_addr(&self) -> io::Result<Endpoint> {
        match self {
            Listener::Tcp(l) => l.local_addr(),
            #[cfg(target_os = "linux")]
            Listener::Vsock(l) => l.local_addr(),
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "vsock is only supported on Linux, use --transport tcp",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        let vsock = Endpoint::new(TransportKind::Vsock, 3, "ignored", 1024).unwrap();
        assert_eq!(vsock.to_string(), "vsock:3:1024");

        let tcp = Endpoint::new(TransportKind::Tcp, 0, "127.0.0.1", 7).unwrap();
        assert_eq!(tcp.to_string(), "127.0.0.1:7");
    }

    #[test]
    fn test_endpoint_display_ipv6() {
        let tcp = Endpoint::new(TransportKind::Tcp, 0, "::1", 7).unwrap();
        assert_eq!(tcp.to_string(), "[::1]:7");

        let addr: std::net::SocketAddr = tcp.to_string().parse().unwrap();
        assert_eq!(addr.port(), 7);
        assert!(addr.ip().is_loopback());

        let bracketed = Endpoint::new(TransportKind::Tcp, 0, "[::1]", 7).unwrap();
        assert_eq!(bracketed.to_string(), "[::1]:7");
    }

    #[test]
    fn test_tcp_port_out_of_range() {
        match Endpoint::new(TransportKind::Tcp, 0, "localhost", 70000) {
            Err(ConfigError::Address { transport: "tcp", .. }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tcp_bind_assigns_port() {
        let endpoint = Endpoint::new(TransportKind::Tcp, 0, "127.0.0.1", 0).unwrap();
        let listener = Listener::bind(&endpoint).await.unwrap();
        match listener.local_addr().unwrap() {
            Endpoint::Tcp { port, .. } => assert_ne!(port, 0),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tcp_connect_and_accept() {
        let endpoint = Endpoint::new(TransportKind::Tcp, 0, "127.0.0.1", 0).unwrap();
        let mut listener = Listener::bind(&endpoint).await.unwrap();
        let bound = listener.local_addr().unwrap();

        let (client, server) = tokio::join!(connect(&bound), listener.accept());
        let client = client.unwrap();
        let server = server.unwrap();

        assert_eq!(client.peer_addr, bound.to_string());
        assert_eq!(server.peer_addr, client.local_addr);
    }
}

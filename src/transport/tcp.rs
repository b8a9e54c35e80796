//! TCP backend.

use std::io;
use tokio::net::{TcpListener, TcpStream};
use tracing::trace;

use super::{Connection, Endpoint};

pub async fn connect(host: &str, port: u16) -> io::Result<Connection> {
    let stream = TcpStream::connect((host, port)).await?;
    // Probes are tiny; don't let Nagle hold them back
    stream.set_nodelay(true)?;
    into_connection(stream)
}

pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub async fn bind(host: &str, port: u16) -> io::Result<Self> {
        let inner = TcpListener::bind((host, port)).await?;
        Ok(Self { inner })
    }

    pub async fn accept(&mut self) -> io::Result<Connection> {
        let (stream, addr) = self.inner.accept().await?;
        trace!(peer = %addr, "tcp accept");
        stream.set_nodelay(true)?;
        into_connection(stream)
    }

    pub fn local_addr(&self) -> io::Result<Endpoint> {
        let addr = self.inner.local_addr()?;
        Ok(Endpoint::Tcp {
            host: addr.ip().to_string(),
            port: addr.port(),
        })
    }
}

fn into_connection(stream: TcpStream) -> io::Result<Connection> {
    let local_addr = stream.local_addr()?.to_string();
    let peer_addr = stream.peer_addr()?.to_string();
    Ok(Connection {
        stream: Box::new(stream),
        local_addr,
        peer_addr,
    })
}

//! VM socket backend.

use std::io;
use tokio_vsock::{VsockAddr, VsockListener, VsockStream};
use tracing::trace;

use super::{Connection, Endpoint};

pub async fn connect(cid: u32, port: u32) -> io::Result<Connection> {
    let stream = VsockStream::connect(VsockAddr::new(cid, port)).await?;
    into_connection(stream)
}

pub struct Listener {
    inner: VsockListener,
}

impl Listener {
    /// Listen on every local context ID. Port 0 maps to `VMADDR_PORT_ANY`.
    pub fn bind(port: u32) -> io::Result<Self> {
        let port = if port == 0 { libc::VMADDR_PORT_ANY } else { port };
        let inner = VsockListener::bind(VsockAddr::new(libc::VMADDR_CID_ANY, port))?;
        Ok(Self { inner })
    }

    pub async fn accept(&mut self) -> io::Result<Connection> {
        let (stream, addr) = self.inner.accept().await?;
        trace!(cid = addr.cid(), port = addr.port(), "vsock accept");
        into_connection(stream)
    }

    pub fn local_addr(&self) -> io::Result<Endpoint> {
        Ok(to_endpoint(self.inner.local_addr()?))
    }
}

fn to_endpoint(addr: VsockAddr) -> Endpoint {
    Endpoint::Vsock {
        cid: addr.cid(),
        port: addr.port(),
    }
}

fn into_connection(stream: VsockStream) -> io::Result<Connection> {
    let local_addr = to_endpoint(stream.local_addr()?).to_string();
    let peer_addr = to_endpoint(stream.peer_addr()?).to_string();
    Ok(Connection {
        stream: Box::new(stream),
        local_addr,
        peer_addr,
    })
}

//! Ephemeral port allocation.
//!
//! Ports are found with a bind-then-release probe: bind port 0, read back the
//! port the OS picked, drop the listener. Nothing is reserved afterwards, so
//! another process may grab the port before the subsystem binds it.

use std::net::SocketAddr;
use std::net::TcpListener;
use std::net::TcpStream;
use std::time::Duration;

use tracing::debug;

use crate::Error;
use crate::Result;

pub const LOCALHOST: &str = "127.0.0.1";

/// Returns a port that was free at the time of the call.
pub fn allocate_port() -> Result<u16> {
    let listener = probe()?;
    let port = listener.local_addr().map_err(Error::ResourceExhaustion)?.port();
    drop(listener);
    debug!(port, "allocated ephemeral port");
    Ok(port)
}

/// `host:port` on the loopback interface.
pub fn local_address(port: u16) -> String {
    format!("{LOCALHOST}:{port}")
}

/// True if something accepts TCP connections at `addr`.
pub(crate) fn is_server_ready(
    addr: &SocketAddr,
    timeout: Duration,
) -> bool {
    TcpStream::connect_timeout(addr, timeout).is_ok()
}

fn probe() -> Result<TcpListener> {
    TcpListener::bind((LOCALHOST, 0)).map_err(Error::ResourceExhaustion)
}

//! UDP endpoints built on tokio sockets

use std::net::SocketAddr;
use std::sync::RwLock;

use tokio::net::UdpSocket;

use crate::core::error::{Result, TickwireError};
use crate::transport::FrameSink;

/// Resolve `host:port` to the first matching socket address
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| TickwireError::Transport(format!("cannot resolve {}:{}: {}", host, port, e)))?
        .next()
        .ok_or_else(|| TickwireError::Transport(format!("no address for {}:{}", host, port)))
}

/// Sends frames to a single, reconfigurable destination
///
/// The socket is a non-blocking std socket so the tick pipeline can send
/// inline without awaiting. It always matches the destination's address
/// family and is rebound when a reconfigure crosses families.
#[derive(Debug)]
pub struct UdpSender {
    route: RwLock<Route>,
}

#[derive(Debug)]
struct Route {
    socket: std::net::UdpSocket,
    destination: SocketAddr,
}

impl UdpSender {
    /// Bind an ephemeral local socket and resolve the destination
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let destination = resolve(host, port).await?;
        let socket = bind_for(&destination)?;

        tracing::info!(%destination, "Telemetry sender ready");
        Ok(Self {
            route: RwLock::new(Route {
                socket,
                destination,
            }),
        })
    }

    /// Point subsequent sends at a new destination
    pub async fn configure(&self, host: &str, port: u16) -> Result<SocketAddr> {
        let destination = resolve(host, port).await?;
        let mut route = self.route.write().unwrap_or_else(|e| e.into_inner());
        if route.destination.is_ipv4() != destination.is_ipv4() {
            route.socket = bind_for(&destination)?;
            tracing::debug!(%destination, "Rebound sender for address family");
        }
        route.destination = destination;
        tracing::info!(%destination, "Telemetry destination changed");
        Ok(destination)
    }

    pub fn destination(&self) -> SocketAddr {
        self.route.read().unwrap_or_else(|e| e.into_inner()).destination
    }
}

/// Ephemeral non-blocking socket in the same family as `destination`
fn bind_for(destination: &SocketAddr) -> Result<std::net::UdpSocket> {
    let bind_addr = if destination.is_ipv4() {
        "0.0.0.0:0"
    } else {
        "[::]:0"
    };
    let socket = std::net::UdpSocket::bind(bind_addr).map_err(|source| TickwireError::Bind {
        addr: bind_addr.to_string(),
        source,
    })?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

impl FrameSink for UdpSender {
    fn send_frame(&self, frame: &[u8]) -> Result<()> {
        let route = self.route.read().unwrap_or_else(|e| e.into_inner());
        let destination = route.destination;
        match route.socket.send_to(frame, destination) {
            Ok(written) if written == frame.len() => Ok(()),
            Ok(written) => Err(TickwireError::Transport(format!(
                "short send to {}: {} of {} bytes",
                destination,
                written,
                frame.len()
            ))),
            Err(e) => Err(TickwireError::Transport(format!(
                "send to {} failed: {}",
                destination, e
            ))),
        }
    }
}

/// Receives frames from any sender on a bound port
#[derive(Debug)]
pub struct UdpReceiver {
    socket: UdpSocket,
    buffer_size: usize,
}

impl UdpReceiver {
    /// Bind the listening socket
    ///
    /// `buffer_size` should exceed the largest accepted frame so that
    /// oversized datagrams are detected instead of silently truncated.
    pub async fn bind(host: &str, port: u16, buffer_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind((host, port))
            .await
            .map_err(|source| TickwireError::Bind {
                addr: format!("{}:{}", host, port),
                source,
            })?;

        tracing::info!(local = %socket.local_addr()?, "Listening for input");
        Ok(Self {
            socket,
            buffer_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait for the next datagram
    pub async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; self.buffer_size];
        let (len, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| TickwireError::Transport(format!("receive failed: {}", e)))?;
        buf.truncate(len);
        Ok((buf, from))
    }

    /// Take a datagram if one is queued, without waiting
    pub fn try_recv(&self) -> Result<Option<(Vec<u8>, SocketAddr)>> {
        let mut buf = vec![0u8; self.buffer_size];
        match self.socket.try_recv_from(&mut buf) {
            Ok((len, from)) => {
                buf.truncate(len);
                Ok(Some((buf, from)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(TickwireError::Transport(format!("receive failed: {}", e))),
        }
    }
}

//! UDP socket setup and the per-socket receive loop.

use crate::codec::{self, Packet};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open socket for {addr}: {source}")]
    BindFailed {
        addr: Ipv4Addr,
        #[source]
        source: std::io::Error,
    },
}

pub struct BoundSocket {
    pub local_addr: SocketAddr,
    pub socket: Arc<UdpSocket>,
}

/// Opens a broadcast-capable, non-blocking UDP socket bound to each address.
/// If any bind fails, every socket opened so far is dropped (closing its fd)
/// and the first error is returned.
pub fn bind_all(addrs: &[Ipv4Addr]) -> Result<Vec<BoundSocket>, TransportError> {
    let mut opened = Vec::with_capacity(addrs.len());
    for addr in addrs {
        opened.push(open_one(*addr)?);
    }
    Ok(opened)
}

fn open_one(addr: Ipv4Addr) -> Result<BoundSocket, TransportError> {
    let map_err = |source: std::io::Error| TransportError::BindFailed { addr, source };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(map_err)?;
    socket.set_reuse_address(true).map_err(map_err)?;
    socket.set_broadcast(true).map_err(map_err)?;
    socket.set_nonblocking(true).map_err(map_err)?;

    let bind_addr: SocketAddr = SocketAddrV4::new(addr, 0).into();
    socket.bind(&bind_addr.into()).map_err(map_err)?;

    let std_socket: std::net::UdpSocket = socket.into();
    let tokio_socket = UdpSocket::from_std(std_socket).map_err(map_err)?;
    let local_addr = tokio_socket.local_addr().map_err(map_err)?;

    Ok(BoundSocket {
        local_addr,
        socket: Arc::new(tokio_socket),
    })
}

/// Reads datagrams off `socket` until it's told to stop or the socket errors
/// out. Datagrams of 4 bytes or fewer can't be a discovery response and are
/// dropped; datagrams that fail to decode are logged and dropped.
///
/// `stop` is a [`CancellationToken`] rather than a bare `Notify`: a plain
/// `Notify::notify_waiters()` only wakes tasks that happen to be parked on
/// `notified()` at the moment it fires, so a cancellation arriving while this
/// loop is off awaiting `tx.send(...)` would be missed, and the next
/// iteration's fresh `notified()` call would wait forever. `cancel()` latches,
/// so every `cancelled()` call made after it — even a brand new one — resolves
/// immediately.
pub async fn receive_loop(
    socket: Arc<UdpSocket>,
    buffer_size: usize,
    tx: mpsc::Sender<Packet>,
    stop: CancellationToken,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((n, _peer)) if n <= 4 => continue,
                    Ok((n, _peer)) => {
                        match codec::decode_frame(&buf[..n], SystemTime::now()) {
                            Ok(packet) => {
                                if tx.send(packet).await.is_err() {
                                    return;
                                }
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, bytes = n, "dropping malformed discovery packet");
                            }
                        }
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "receive loop ending");
                        return;
                    }
                }
            }
            _ = stop.cancelled() => {
                tracing::debug!("receive loop stopping");
                return;
            }
        }
    }
}

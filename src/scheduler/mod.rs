//! Periodically broadcasts the v1 hello probe on every bound socket, backing
//! off the interval between sends up to a cap.

use crate::codec::HELLO_V1;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

pub const DISCOVERY_PORT: u16 = 10001;
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);
pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(233, 89, 188, 1);

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub backoff_factor: f64,
}

/// The interval to use on the *next* send, given the one just used.
pub fn next_interval(current: Duration, max: Duration, factor: f64) -> Duration {
    if current >= max {
        return max;
    }
    current.mul_f64(factor).min(max)
}

/// Sends the hello probe on every socket, then sleeps for the current
/// interval (growing it afterwards), until `stop` fires. `stop` is a
/// [`CancellationToken`]: unlike a bare `Notify`, `cancel()` latches, so this
/// loop can't miss a shutdown signal that arrives while it's off sending
/// probes rather than parked on the stop branch of `select!`.
pub async fn run(sockets: Vec<Arc<UdpSocket>>, config: SchedulerConfig, stop: CancellationToken) {
    let broadcast: SocketAddr = (BROADCAST_ADDR, DISCOVERY_PORT).into();
    let multicast: SocketAddr = (MULTICAST_ADDR, DISCOVERY_PORT).into();
    let mut interval = config.initial_interval;

    loop {
        for socket in &sockets {
            let _ = socket.send_to(&HELLO_V1, multicast).await;
            let _ = socket.send_to(&HELLO_V1, broadcast).await;
        }
        tracing::info!("sent broadcast, will send again in {:?}", interval);

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop.cancelled() => {
                tracing::debug!("scheduler stopping");
                return;
            }
        }

        interval = next_interval(interval, config.max_interval, config.backoff_factor);
    }
}

//! Wires the interface binder, transport, scheduler and registry together
//! into a single discovery run.

use crate::codec::Packet;
use crate::config::EngineConfig;
use crate::device::Device;
use crate::error::EngineError;
use crate::interface;
use crate::registry::{NotifySink, Registry};
use crate::scheduler::{self, SchedulerConfig};
use crate::transport;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running discovery session. Dropping the handles without calling
/// [`Engine::close`] leaves the background tasks running; `close` consumes
/// `self`, so a stopped engine can't be restarted or queried again — the
/// type system enforces the one-way `Running -> Stopped` transition instead
/// of a runtime flag. Shutdown itself is signalled through a
/// [`CancellationToken`] rather than a `Notify`, so a receiver or the
/// scheduler can't miss the signal by being between iterations when `close`
/// is called.
pub struct Engine {
    registry: Arc<Registry>,
    stop: CancellationToken,
    receivers: Vec<JoinHandle<()>>,
    scheduler: JoinHandle<()>,
    ingress: JoinHandle<()>,
}

impl Engine {
    /// Binds every usable address on the named interfaces, starts the
    /// receive tasks, the probe scheduler, and the ingress task, and returns
    /// once everything is listening.
    pub async fn auto_discover(
        notify: Option<NotifySink>,
        interface_names: &[String],
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let config = config.normalized();
        let addrs = interface::resolve_bind_addresses(interface_names)?;
        if addrs.is_empty() {
            return Err(EngineError::NoUsableInterface(interface_names.to_vec()));
        }

        let bound = transport::bind_all(&addrs)?;
        for socket in &bound {
            tracing::info!("listen on {}", socket.local_addr);
        }

        let (tx, rx) = mpsc::channel::<Packet>(config.ingress_channel_capacity);
        let registry = Arc::new(Registry::new(config.recently_seen_window));
        let stop = CancellationToken::new();

        let mut receivers = Vec::with_capacity(bound.len());
        let mut sockets = Vec::with_capacity(bound.len());
        for socket in &bound {
            sockets.push(Arc::clone(&socket.socket));
            let receiver_socket = Arc::clone(&socket.socket);
            let receiver_tx = tx.clone();
            let receiver_stop = stop.clone();
            receivers.push(tokio::spawn(transport::receive_loop(
                receiver_socket,
                config.receive_buffer_size,
                receiver_tx,
                receiver_stop,
            )));
        }
        drop(tx);

        let scheduler_config = SchedulerConfig {
            initial_interval: config.probe_initial_interval,
            max_interval: config.probe_max_interval,
            backoff_factor: config.probe_backoff_factor,
        };
        let scheduler = tokio::spawn(scheduler::run(sockets, scheduler_config, stop.clone()));

        let ingress = tokio::spawn(run_ingress(rx, Arc::clone(&registry), notify));

        Ok(Self {
            registry,
            stop,
            receivers,
            scheduler,
            ingress,
        })
    }

    /// The devices discovered so far.
    pub fn list(&self) -> Vec<Device> {
        self.registry.list()
    }

    /// A single discovered device by MAC address, if known.
    pub fn find(&self, mac: &str) -> Option<Device> {
        self.registry.find(mac)
    }

    /// Signals every background task to stop, then waits for all of them to
    /// finish in order: receivers and scheduler first, then the ingress
    /// task, which drains naturally once its last sender is dropped.
    pub async fn close(self) {
        self.stop.cancel();

        for handle in self.receivers {
            let _ = handle.await;
        }
        let _ = self.scheduler.await;
        let _ = self.ingress.await;
    }
}

async fn run_ingress(
    mut rx: mpsc::Receiver<Packet>,
    registry: Arc<Registry>,
    notify: Option<NotifySink>,
) {
    while let Some(packet) = rx.recv().await {
        let device = Device::from_packet(&packet);
        registry.ingest(device, notify.as_ref());
    }
}

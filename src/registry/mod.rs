//! The live table of discovered devices, keyed by MAC address.

use crate::device::Device;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Invoked once per device the first time it's seen, and again any time a
/// device resurfaces after having fallen outside the recently-seen window.
pub type NotifySink = Arc<dyn Fn(Device) + Send + Sync>;

pub struct Registry {
    devices: RwLock<HashMap<String, Device>>,
    recently_seen_window: Duration,
}

impl Registry {
    pub fn new(recently_seen_window: Duration) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            recently_seen_window,
        }
    }

    /// Merges a freshly decoded sighting into the table. The notify sink, if
    /// given, runs outside the write lock: once to decide whether the
    /// sighting is novel, then dropped before the table is mutated.
    pub fn ingest(&self, device: Device, notify: Option<&NotifySink>) {
        let should_notify = {
            let table = self.devices.read();
            match table.get(&device.mac_address) {
                Some(existing) => !existing.recently_seen(self.recently_seen_window),
                None => true,
            }
        };

        if should_notify {
            if let Some(sink) = notify {
                sink(device.snapshot());
            }
        }

        let mut table = self.devices.write();
        match table.get_mut(&device.mac_address) {
            Some(existing) => existing.merge(&device),
            None => {
                table.insert(device.mac_address.clone(), device);
            }
        }
    }

    /// A safe-to-keep copy of every discovered device.
    pub fn list(&self) -> Vec<Device> {
        self.devices.read().values().map(Device::snapshot).collect()
    }

    /// A safe-to-keep copy of a single device, if known.
    pub fn find(&self, mac: &str) -> Option<Device> {
        self.devices.read().get(mac).map(Device::snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_frame, tags};
    use parking_lot::Mutex;
    use std::time::SystemTime;

    fn packet_for(mac_suffix: u8, uptime_secs: u32) -> crate::codec::Packet {
        let mut payload = Vec::new();
        payload.push(tags::HW_ADDR);
        payload.extend_from_slice(&6u16.to_be_bytes());
        payload.extend_from_slice(&[0x04, 0x18, 0xd6, 0x00, 0x00, mac_suffix]);
        payload.push(tags::UPTIME);
        payload.extend_from_slice(&4u16.to_be_bytes());
        payload.extend_from_slice(&uptime_secs.to_be_bytes());

        let mut raw = vec![0x01, 0x00];
        raw.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        raw.extend_from_slice(&payload);
        decode_frame(&raw, SystemTime::now()).unwrap()
    }

    #[test]
    fn first_sighting_always_notifies() {
        let registry = Registry::new(Duration::from_secs(60));
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: NotifySink = Arc::new(move |d: Device| sink_seen.lock().push(d.mac_address));

        registry.ingest(Device::from_packet(&packet_for(0x01, 1)), Some(&sink));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn resighting_within_window_does_not_renotify() {
        let registry = Registry::new(Duration::from_secs(60));
        let count = Arc::new(Mutex::new(0usize));
        let sink_count = Arc::clone(&count);
        let sink: NotifySink = Arc::new(move |_: Device| *sink_count.lock() += 1);

        registry.ingest(Device::from_packet(&packet_for(0x02, 1)), Some(&sink));
        registry.ingest(Device::from_packet(&packet_for(0x02, 2)), Some(&sink));
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn resighting_after_window_renotifies() {
        let registry = Registry::new(Duration::from_millis(10));
        let count = Arc::new(Mutex::new(0usize));
        let sink_count = Arc::clone(&count);
        let sink: NotifySink = Arc::new(move |_: Device| *sink_count.lock() += 1);

        registry.ingest(Device::from_packet(&packet_for(0x03, 1)), Some(&sink));
        std::thread::sleep(Duration::from_millis(30));
        registry.ingest(Device::from_packet(&packet_for(0x03, 2)), Some(&sink));
        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn merge_updates_existing_entry_rather_than_duplicating() {
        let registry = Registry::new(Duration::from_secs(60));
        registry.ingest(Device::from_packet(&packet_for(0x04, 1)), None);
        registry.ingest(Device::from_packet(&packet_for(0x04, 2)), None);
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn find_returns_none_for_unknown_mac() {
        let registry = Registry::new(Duration::from_secs(60));
        assert!(registry.find("aa:bb:cc:dd:ee:ff").is_none());
    }
}

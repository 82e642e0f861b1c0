//! The discovered-device record and its merge/snapshot semantics.

use crate::codec::{tags, Packet, TagValue};
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub mac_address: String,
    pub model: String,
    pub platform: String,
    pub firmware: String,
    pub hostname: String,
    pub essid: String,
    pub wireless_mode: String,
    /// Keyed by the interface MAC reported in an `ipinfo` tag; a device can
    /// report more than one address per interface across sightings.
    pub ip_addresses: HashMap<String, Vec<Ipv4Addr>>,
    pub up_since: Option<SystemTime>,
    pub first_seen_at: SystemTime,
    pub last_seen_at: SystemTime,
}

impl Device {
    fn blank(at: SystemTime) -> Self {
        Self {
            mac_address: String::new(),
            model: String::new(),
            platform: String::new(),
            firmware: String::new(),
            hostname: String::new(),
            essid: String::new(),
            wireless_mode: String::new(),
            ip_addresses: HashMap::new(),
            up_since: None,
            first_seen_at: at,
            last_seen_at: at,
        }
    }

    /// Projects a decoded response packet into a device record. `first_seen_at`
    /// is stamped with the current instant (projection time); `last_seen_at`
    /// takes the packet's own receive timestamp.
    pub fn from_packet(packet: &Packet) -> Self {
        let mut device = Device::blank(SystemTime::now());
        device.last_seen_at = packet.received_at;
        for tag in &packet.tags {
            match (tag.id, &tag.value) {
                (tags::HW_ADDR, TagValue::Mac(mac)) => device.mac_address = mac.to_string(),
                (tags::MODEL_V1, TagValue::Str(s)) | (tags::MODEL_V2, TagValue::Str(s)) => {
                    device.model = s.clone()
                }
                (tags::PLATFORM, TagValue::Str(s)) => device.platform = s.clone(),
                (tags::FIRMWARE, TagValue::Str(s)) => device.firmware = s.clone(),
                (tags::HOSTNAME, TagValue::Str(s)) => device.hostname = s.clone(),
                (tags::ESSID, TagValue::Str(s)) => device.essid = s.clone(),
                (tags::WMODE, TagValue::U8(mode)) => device.wireless_mode = wmode_name(*mode),
                (tags::UPTIME, TagValue::U32(secs)) => {
                    device.up_since = packet
                        .received_at
                        .checked_sub(Duration::from_secs(*secs as u64));
                }
                (tags::IP_INFO, TagValue::IpInfo(info)) => {
                    device
                        .ip_addresses
                        .entry(info.mac.to_string())
                        .or_default()
                        .push(info.ip);
                }
                _ => {}
            }
        }
        device
    }

    /// True if this device was last seen less than `window` ago.
    pub fn recently_seen(&self, window: Duration) -> bool {
        match self.last_seen_at.checked_add(window) {
            Some(expires_at) => expires_at > SystemTime::now(),
            None => true,
        }
    }

    /// Overwrites scalar fields from `source`, rebuilds the ip address map,
    /// advances `last_seen_at`, and keeps the earliest `first_seen_at`.
    pub fn merge(&mut self, source: &Device) {
        self.mac_address = source.mac_address.clone();
        self.model = source.model.clone();
        self.platform = source.platform.clone();
        self.firmware = source.firmware.clone();
        self.hostname = source.hostname.clone();
        self.essid = source.essid.clone();
        self.wireless_mode = source.wireless_mode.clone();
        self.ip_addresses = source.ip_addresses.clone();
        self.up_since = source.up_since;
        self.last_seen_at = source.last_seen_at;
        self.first_seen_at = self.first_seen_at.min(source.first_seen_at);
    }

    /// A deep copy safe to hand to a caller: a fresh device stamped `now`,
    /// then merged with `self` so every field ends up observably equal to
    /// the original.
    pub fn snapshot(&self) -> Device {
        let mut copy = Device::blank(SystemTime::now());
        copy.merge(self);
        copy
    }
}

fn wmode_name(mode: u8) -> String {
    match mode {
        2 => "Station".to_string(),
        3 => "AccessPoint".to_string(),
        other => format!("unknown ({:#04x})", other),
    }
}

fn format_elapsed(now: SystemTime, past: SystemTime) -> String {
    match now.duration_since(past) {
        Ok(d) => format!("{}s", d.as_secs()),
        Err(_) => "0s".to_string(),
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let now = SystemTime::now();
        writeln!(f, "Device")?;
        writeln!(f, "  MAC:          {}", self.mac_address)?;
        writeln!(f, "  Model:        {}", self.model)?;
        writeln!(f, "  Platform:     {}", self.platform)?;
        writeln!(f, "  Firmware:     {}", self.firmware)?;
        writeln!(f, "  Hostname:     {}", self.hostname)?;
        if let Some(up_since) = self.up_since {
            writeln!(f, "  booted:       {} ago", format_elapsed(now, up_since))?;
        }
        writeln!(
            f,
            "  first seen:   {} ago",
            format_elapsed(now, self.first_seen_at)
        )?;
        writeln!(
            f,
            "  last seen:    {} ago",
            format_elapsed(now, self.last_seen_at)
        )?;

        let mut interfaces: Vec<&String> = self.ip_addresses.keys().collect();
        interfaces.sort();
        for mac in interfaces {
            writeln!(f, "  IP addresses on interface {}", mac)?;
            for ip in &self.ip_addresses[mac] {
                writeln!(f, "    - {}", ip)?;
            }
        }

        if !self.essid.is_empty() {
            writeln!(f, "  ESSID:        {}", self.essid)?;
        }
        if !self.wireless_mode.is_empty() {
            writeln!(f, "  WMode:        {}", self.wireless_mode)?;
        }
        Ok(())
    }
}

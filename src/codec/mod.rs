//! TLV frame codec for UBNT discovery responses.
//!
//! A response datagram is a 4-byte header (version, command, big-endian
//! payload length) followed by a run of tags, each `id(1) | len(2) | value(len)`.

use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

pub const FRAME_HEADER_LEN: usize = 4;
pub const TAG_HEADER_LEN: usize = 3;

/// v1 hello: cmd 0, empty payload. This is the only probe the scheduler sends.
pub const HELLO_V1: [u8; 4] = [0x01, 0x00, 0x00, 0x00];
/// v2 hello, kept for parity with the original tool; never sent by the scheduler.
pub const HELLO_V2: [u8; 4] = [0x02, 0x0a, 0x00, 0x00];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed frame ({0} bytes)")]
    MalformedFrame(usize),
    #[error("unsupported packet version={version} command={command}")]
    UnsupportedVersion { version: u8, command: u8 },
    #[error("tag {id:#04x} truncated (declared {declared}, {remaining} bytes left)")]
    TruncatedTag {
        id: u8,
        declared: u16,
        remaining: usize,
    },
    #[error("length mismatch for tag {name} (expected {expected} bytes, got {got})")]
    TagLengthMismatch {
        name: &'static str,
        expected: u16,
        got: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareAddress(pub [u8; 6]);

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IpInfo {
    pub mac: HardwareAddress,
    pub ip: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Str(String),
    U8(u8),
    U16(u16),
    U32(u32),
    Bool(bool),
    Mac(HardwareAddress),
    IpInfo(IpInfo),
    /// Known-but-opaque tags and genuinely unrecognized ids both fall back
    /// here; the raw bytes are rendered as `len:<n><hex>` on display.
    UnknownRaw(Vec<u8>),
}

impl TagValue {
    /// The string a console listing would show for this value.
    pub fn rendered(&self) -> String {
        match self {
            TagValue::Str(s) => s.clone(),
            TagValue::U8(v) => v.to_string(),
            TagValue::U16(v) => v.to_string(),
            TagValue::U32(v) => v.to_string(),
            TagValue::Bool(v) => v.to_string(),
            TagValue::Mac(mac) => mac.to_string(),
            TagValue::IpInfo(info) => format!("{} -> {}", info.mac, info.ip),
            TagValue::UnknownRaw(bytes) => format!("len:{}<{}>", bytes.len(), to_hex(bytes)),
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[derive(Debug, Clone, Copy)]
pub struct TagDescription {
    pub short_name: &'static str,
    /// `None` means the id wasn't in the table at all; its description is
    /// synthesized as `unknown (0xNN)`.
    pub long_name: Option<&'static str>,
    pub byte_len: Option<u16>,
}

pub mod tags {
    pub const HW_ADDR: u8 = 0x01;
    pub const IP_INFO: u8 = 0x02;
    pub const FIRMWARE: u8 = 0x03;
    pub const USERNAME: u8 = 0x06;
    pub const SALT: u8 = 0x07;
    pub const RND_CHALLENGE: u8 = 0x08;
    pub const CHALLENGE: u8 = 0x09;
    pub const UPTIME: u8 = 0x0A;
    pub const HOSTNAME: u8 = 0x0B;
    pub const PLATFORM: u8 = 0x0C;
    pub const ESSID: u8 = 0x0D;
    pub const WMODE: u8 = 0x0E;
    pub const WEBUI: u8 = 0x0F;
    pub const SEQ: u8 = 0x12;
    pub const SOURCE_MAC: u8 = 0x13;
    pub const MODEL_V1: u8 = 0x14;
    pub const MODEL_V2: u8 = 0x15;
    pub const SHORT_VERSION: u8 = 0x16;
    pub const DEFAULT: u8 = 0x17;
    pub const LOCATING: u8 = 0x18;
    pub const DHCPC: u8 = 0x19;
    pub const DHCPC_BOUND: u8 = 0x1A;
    pub const REQ_FIRMWARE: u8 = 0x1B;
    pub const SSHD_PORT: u8 = 0x1C;
}

fn describe(id: u8) -> TagDescription {
    use tags::*;
    match id {
        HW_ADDR => TagDescription {
            short_name: "hwaddr",
            long_name: Some("Hardware/MAC address"),
            byte_len: Some(6),
        },
        IP_INFO => TagDescription {
            short_name: "ipinfo",
            long_name: Some("MAC/IP address mapping"),
            byte_len: Some(10),
        },
        FIRMWARE => TagDescription {
            short_name: "firmware",
            long_name: Some("Firmware"),
            byte_len: None,
        },
        USERNAME => TagDescription {
            short_name: "username",
            long_name: Some("Username"),
            byte_len: None,
        },
        SALT => TagDescription {
            short_name: "salt",
            long_name: Some("(?)"),
            byte_len: None,
        },
        RND_CHALLENGE => TagDescription {
            short_name: "rnd-challenge",
            long_name: Some("(?)"),
            byte_len: None,
        },
        CHALLENGE => TagDescription {
            short_name: "challenge",
            long_name: Some("(?)"),
            byte_len: None,
        },
        UPTIME => TagDescription {
            short_name: "uptime",
            long_name: Some("Uptime"),
            byte_len: Some(4),
        },
        HOSTNAME => TagDescription {
            short_name: "hostname",
            long_name: Some("Hostname"),
            byte_len: None,
        },
        PLATFORM => TagDescription {
            short_name: "platform",
            long_name: Some("Platform information"),
            byte_len: None,
        },
        ESSID => TagDescription {
            short_name: "essid",
            long_name: Some("Wireless ESSID"),
            byte_len: None,
        },
        WMODE => TagDescription {
            short_name: "wmode",
            long_name: Some("Wireless mode"),
            byte_len: Some(1),
        },
        WEBUI => TagDescription {
            short_name: "webui",
            long_name: Some("URL for Web-UI"),
            byte_len: None,
        },
        SEQ => TagDescription {
            short_name: "seq",
            long_name: Some("(?)"),
            byte_len: None,
        },
        SOURCE_MAC => TagDescription {
            short_name: "source-mac",
            long_name: Some("(?)"),
            byte_len: None,
        },
        MODEL_V1 => TagDescription {
            short_name: "model.v1",
            long_name: Some("Model name"),
            byte_len: None,
        },
        MODEL_V2 => TagDescription {
            short_name: "model.v2",
            long_name: Some("Model name"),
            byte_len: None,
        },
        SHORT_VERSION => TagDescription {
            short_name: "short-ver",
            long_name: Some("Short version"),
            byte_len: None,
        },
        DEFAULT => TagDescription {
            short_name: "default",
            long_name: Some("(bool)"),
            byte_len: Some(1),
        },
        LOCATING => TagDescription {
            short_name: "locating",
            long_name: Some("(bool)"),
            byte_len: Some(1),
        },
        DHCPC => TagDescription {
            short_name: "dhcpc",
            long_name: Some("(bool)"),
            byte_len: Some(1),
        },
        DHCPC_BOUND => TagDescription {
            short_name: "dhcpc-bound",
            long_name: Some("(bool)"),
            byte_len: Some(1),
        },
        REQ_FIRMWARE => TagDescription {
            short_name: "req-firmware",
            long_name: Some("(string)"),
            byte_len: None,
        },
        SSHD_PORT => TagDescription {
            short_name: "sshd-port",
            long_name: Some("SSH port"),
            byte_len: Some(2),
        },
        _ => TagDescription {
            short_name: "unknown",
            long_name: None,
            byte_len: None,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: u8,
    pub description: TagDescription,
    pub value: TagValue,
}

impl Tag {
    pub fn long_name(&self) -> String {
        match self.description.long_name {
            Some(s) => s.to_string(),
            None => format!("unknown ({:#04x})", self.id),
        }
    }
}

fn decode_tag(id: u8, raw: &[u8]) -> Result<Tag, DecodeError> {
    use tags::*;
    let description = describe(id);
    if let Some(expected) = description.byte_len {
        if raw.len() as u16 != expected {
            return Err(DecodeError::TagLengthMismatch {
                name: description.short_name,
                expected,
                got: raw.len() as u16,
            });
        }
    }

    let value = match id {
        HW_ADDR => TagValue::Mac(parse_mac(raw)?),
        IP_INFO => {
            let mac = parse_mac(&raw[0..6])?;
            let ip = Ipv4Addr::new(raw[6], raw[7], raw[8], raw[9]);
            TagValue::IpInfo(IpInfo { mac, ip })
        }
        FIRMWARE | HOSTNAME | PLATFORM | ESSID | MODEL_V1 | MODEL_V2 | SHORT_VERSION
        | REQ_FIRMWARE => TagValue::Str(String::from_utf8_lossy(raw).into_owned()),
        UPTIME => TagValue::U32(u32::from_be_bytes(raw.try_into().unwrap())),
        WMODE => TagValue::U8(raw[0]),
        SSHD_PORT => TagValue::U16(u16::from_be_bytes(raw.try_into().unwrap())),
        DEFAULT | LOCATING | DHCPC | DHCPC_BOUND => TagValue::Bool(raw[0] != 0),
        _ => TagValue::UnknownRaw(raw.to_vec()),
    };

    Ok(Tag {
        id,
        description,
        value,
    })
}

fn parse_mac(raw: &[u8]) -> Result<HardwareAddress, DecodeError> {
    let bytes: [u8; 6] = raw.try_into().map_err(|_| DecodeError::TagLengthMismatch {
        name: "hwaddr",
        expected: 6,
        got: raw.len() as u16,
    })?;
    Ok(HardwareAddress(bytes))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub version: u8,
    pub command: u8,
    pub tags: Vec<Tag>,
    pub received_at: std::time::SystemTime,
}

/// Decodes a single UDP datagram into a [`Packet`]. Any malformed tag aborts
/// the whole packet rather than skipping the offending tag.
pub fn decode_frame(
    raw: &[u8],
    received_at: std::time::SystemTime,
) -> Result<Packet, DecodeError> {
    if raw.len() < FRAME_HEADER_LEN {
        return Err(DecodeError::MalformedFrame(raw.len()));
    }
    let version = raw[0];
    let command = raw[1];
    let length = u16::from_be_bytes([raw[2], raw[3]]) as usize;
    if raw.len() != length + FRAME_HEADER_LEN {
        return Err(DecodeError::MalformedFrame(raw.len()));
    }
    if !((version == 1 && command == 0) || version == 2) {
        return Err(DecodeError::UnsupportedVersion { version, command });
    }

    let payload = &raw[FRAME_HEADER_LEN..];
    let mut tags = Vec::new();
    let mut cursor = 0usize;
    while cursor < payload.len() {
        if payload.len() - cursor < TAG_HEADER_LEN {
            return Err(DecodeError::TruncatedTag {
                id: payload[cursor],
                declared: 0,
                remaining: payload.len() - cursor,
            });
        }
        let id = payload[cursor];
        let declared = u16::from_be_bytes([payload[cursor + 1], payload[cursor + 2]]);
        let begin = cursor + TAG_HEADER_LEN;
        let end = begin + declared as usize;
        if end > payload.len() {
            return Err(DecodeError::TruncatedTag {
                id,
                declared,
                remaining: payload.len() - begin.min(payload.len()),
            });
        }
        tags.push(decode_tag(id, &payload[begin..end])?);
        cursor = end;
    }

    Ok(Packet {
        version,
        command,
        tags,
        received_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut raw = vec![0x01, 0x00];
        raw.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        raw.extend_from_slice(payload);
        raw
    }

    #[test]
    fn decodes_uptime_tag() {
        let payload = [tags::UPTIME, 0x00, 0x04, 0x00, 0x00, 0x0e, 0x10];
        let packet = decode_frame(&frame(&payload), SystemTime::now()).unwrap();
        assert_eq!(packet.tags.len(), 1);
        assert_eq!(packet.tags[0].value, TagValue::U32(3600));
        assert_eq!(packet.tags[0].description.short_name, "uptime");
    }

    #[test]
    fn scenario_uptime_tag_literal_bytes() {
        let payload = [0x0A, 0x00, 0x04, 0x01, 0x02, 0x03, 0x04];
        let packet = decode_frame(&frame(&payload), SystemTime::now()).unwrap();
        assert_eq!(packet.tags[0].value, TagValue::U32(16_909_060));
        assert_eq!(packet.tags[0].description.short_name, "uptime");
    }

    #[test]
    fn scenario_ip_info_tag_literal_bytes() {
        let payload = [
            0x02, 0x00, 0x0A, 0x04, 0x18, 0xD6, 0x83, 0xF8, 0xEC, 0xAC, 0x10, 0x00, 0x01,
        ];
        let packet = decode_frame(&frame(&payload), SystemTime::now()).unwrap();
        match &packet.tags[0].value {
            TagValue::IpInfo(info) => {
                assert_eq!(info.mac.to_string(), "04:18:d6:83:f8:ec");
                assert_eq!(info.ip, Ipv4Addr::new(172, 16, 0, 1));
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn scenario_unknown_tag_literal_bytes() {
        let payload = [0x42, 0x00, 0x03, 0xC0, 0xFF, 0xEE];
        let packet = decode_frame(&frame(&payload), SystemTime::now()).unwrap();
        let tag = &packet.tags[0];
        assert_eq!(tag.value.rendered(), "len:3<c0ffee>");
        assert_eq!(tag.description.short_name, "unknown");
        assert_eq!(tag.long_name(), "unknown (0x42)");
    }

    #[test]
    fn decodes_ip_info_tag() {
        let mut payload = vec![tags::IP_INFO, 0x00, 0x0a];
        payload.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        payload.extend_from_slice(&[192, 168, 1, 42]);
        let packet = decode_frame(&frame(&payload), SystemTime::now()).unwrap();
        match &packet.tags[0].value {
            TagValue::IpInfo(info) => {
                assert_eq!(info.ip, Ipv4Addr::new(192, 168, 1, 42));
                assert_eq!(info.mac.to_string(), "de:ad:be:ef:00:01");
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn renders_unknown_tag_as_hex_blob() {
        let payload = [0x42, 0x00, 0x03, 0xc0, 0xff, 0xee];
        let packet = decode_frame(&frame(&payload), SystemTime::now()).unwrap();
        let tag = &packet.tags[0];
        assert_eq!(tag.value.rendered(), "len:3<c0ffee>");
        assert_eq!(tag.long_name(), "unknown (0x42)");
        assert_eq!(tag.description.short_name, "unknown");
    }

    #[test]
    fn known_opaque_tag_keeps_its_name_but_renders_hex() {
        let payload = [tags::CHALLENGE, 0x00, 0x02, 0xaa, 0xbb];
        let packet = decode_frame(&frame(&payload), SystemTime::now()).unwrap();
        let tag = &packet.tags[0];
        assert_eq!(tag.description.short_name, "challenge");
        assert_eq!(tag.long_name(), "(?)");
        assert_eq!(tag.value.rendered(), "len:2<aabb>");
    }

    #[test]
    fn rejects_frame_with_bad_length_header() {
        let mut raw = frame(&[tags::UPTIME, 0x00, 0x04, 0, 0, 0, 1]);
        raw.push(0xff); // trailing byte not accounted for in header length
        let err = decode_frame(&raw, SystemTime::now()).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedFrame(_)));
    }

    #[test]
    fn rejects_unsupported_version_command_combo() {
        let raw = vec![0x01, 0x05, 0x00, 0x00];
        let err = decode_frame(&raw, SystemTime::now()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnsupportedVersion {
                version: 1,
                command: 5
            }
        ));
    }

    #[test]
    fn aborts_whole_packet_on_truncated_tag() {
        let payload = [tags::HOSTNAME, 0x00, 0x05, b'h', b'i'];
        let err = decode_frame(&frame(&payload), SystemTime::now()).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedTag { .. }));
    }

    #[test]
    fn aborts_whole_packet_on_fixed_length_mismatch() {
        let payload = [tags::UPTIME, 0x00, 0x02, 0x00, 0x01];
        let err = decode_frame(&frame(&payload), SystemTime::now()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TagLengthMismatch {
                name: "uptime",
                expected: 4,
                got: 2
            }
        ));
    }

    /// Synthetic EdgeRouter-shaped response: hostname, platform, firmware, mac, uptime.
    #[test]
    fn decodes_synthetic_edgerouter_packet() {
        let mut payload = Vec::new();
        payload.push(tags::HW_ADDR);
        payload.extend_from_slice(&6u16.to_be_bytes());
        payload.extend_from_slice(&[0x04, 0x18, 0xd6, 0x11, 0x22, 0x33]);

        payload.push(tags::PLATFORM);
        let platform = b"e120";
        payload.extend_from_slice(&(platform.len() as u16).to_be_bytes());
        payload.extend_from_slice(platform);

        payload.push(tags::HOSTNAME);
        let hostname = b"EdgeRouter";
        payload.extend_from_slice(&(hostname.len() as u16).to_be_bytes());
        payload.extend_from_slice(hostname);

        payload.push(tags::UPTIME);
        payload.extend_from_slice(&4u16.to_be_bytes());
        payload.extend_from_slice(&600u32.to_be_bytes());

        let packet = decode_frame(&frame(&payload), SystemTime::now()).unwrap();
        assert_eq!(packet.tags.len(), 4);
    }
}

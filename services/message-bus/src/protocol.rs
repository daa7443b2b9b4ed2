//! Message envelope framing
//!
//! Every bus message carries a fixed-prefix header. Two versions coexist on
//! the wire:
//!
//! ```text
//! V1 (16 B): [version: u16][type: u16][size: u32][timestamp_ns: u64]
//! V2 (24 B): V1 fields with version=2, plus [flags: u32][crc32: u32]
//! ```
//!
//! All fields are little-endian. Flag bit 0 (`FLAG_HAS_CRC32`) marks a V2
//! message whose `crc32` field must equal the CRC-32 (reflected, polynomial
//! 0xEDB88320) of the payload.

use thiserror::Error;

pub const PROTOCOL_VERSION_V1: u16 = 1;
pub const PROTOCOL_VERSION_V2: u16 = 2;

pub const HEADER_LEN_V1: usize = 16;
pub const HEADER_LEN_V2: usize = 24;

/// Payload carries a CRC-32 in the V2 header.
pub const FLAG_HAS_CRC32: u32 = 1 << 0;

/// Message types carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageType {
    MarketTick = 1,
    Order = 2,
    Trade = 3,
}

impl MessageType {
    pub fn from_wire(raw: u16) -> Option<Self> {
        match raw {
            1 => Some(MessageType::MarketTick),
            2 => Some(MessageType::Order),
            3 => Some(MessageType::Trade),
            _ => None,
        }
    }
}

/// Version-independent view of a decoded header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: u16,
    pub msg_type: u16,
    pub size: u32,
    pub timestamp_ns: u64,
    pub flags: u32,
    pub crc32: u32,
}

/// A validated header plus the number of prefix bytes it occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedHeader {
    pub header: MessageHeader,
    pub header_len: usize,
}

/// Envelope decoding failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("buffer too short: need {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },

    #[error("unknown protocol version {0}")]
    UnknownVersion(u16),

    #[error("declared payload size {declared} exceeds remaining {available} bytes")]
    SizeMismatch { declared: u32, available: usize },

    #[error("payload checksum mismatch: header {header:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { header: u32, computed: u32 },
}

/// CRC-32 of a payload (reflected IEEE polynomial, init/xorout 0xFFFFFFFF).
pub fn compute_crc32(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Encode a payload under a V1 header.
pub fn encode_message(msg_type: MessageType, payload: &[u8], timestamp_ns: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN_V1 + payload.len());
    buf.extend_from_slice(&PROTOCOL_VERSION_V1.to_le_bytes());
    buf.extend_from_slice(&(msg_type as u16).to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&timestamp_ns.to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Encode a payload under a V2 header. When `FLAG_HAS_CRC32` is set the
/// payload checksum is computed and stored in the header.
pub fn encode_message_v2(
    msg_type: MessageType,
    payload: &[u8],
    timestamp_ns: u64,
    flags: u32,
) -> Vec<u8> {
    let crc = if flags & FLAG_HAS_CRC32 != 0 {
        compute_crc32(payload)
    } else {
        0
    };

    let mut buf = Vec::with_capacity(HEADER_LEN_V2 + payload.len());
    buf.extend_from_slice(&PROTOCOL_VERSION_V2.to_le_bytes());
    buf.extend_from_slice(&(msg_type as u16).to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&timestamp_ns.to_le_bytes());
    buf.extend_from_slice(&flags.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Decode and validate a header from the front of `data`.
///
/// Rejects short buffers, unknown versions, payload sizes that overrun the
/// buffer, and (for flagged V2 messages) checksum mismatches.
pub fn decode_header(data: &[u8]) -> Result<DecodedHeader, ProtocolError> {
    if data.len() < HEADER_LEN_V1 {
        return Err(ProtocolError::TooShort {
            need: HEADER_LEN_V1,
            have: data.len(),
        });
    }

    let version = u16::from_le_bytes([data[0], data[1]]);
    let msg_type = u16::from_le_bytes([data[2], data[3]]);
    let size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let timestamp_ns = u64::from_le_bytes(data[8..16].try_into().expect("slice length checked"));

    let (flags, crc32, header_len) = match version {
        PROTOCOL_VERSION_V1 => (0, 0, HEADER_LEN_V1),
        PROTOCOL_VERSION_V2 => {
            if data.len() < HEADER_LEN_V2 {
                return Err(ProtocolError::TooShort {
                    need: HEADER_LEN_V2,
                    have: data.len(),
                });
            }
            let flags = u32::from_le_bytes(data[16..20].try_into().expect("slice length checked"));
            let crc = u32::from_le_bytes(data[20..24].try_into().expect("slice length checked"));
            (flags, crc, HEADER_LEN_V2)
        }
        other => return Err(ProtocolError::UnknownVersion(other)),
    };

    let available = data.len() - header_len;
    if size as usize > available {
        return Err(ProtocolError::SizeMismatch {
            declared: size,
            available,
        });
    }

    if flags & FLAG_HAS_CRC32 != 0 {
        let payload = &data[header_len..header_len + size as usize];
        let computed = compute_crc32(payload);
        if computed != crc32 {
            return Err(ProtocolError::ChecksumMismatch {
                header: crc32,
                computed,
            });
        }
    }

    Ok(DecodedHeader {
        header: MessageHeader {
            version,
            msg_type,
            size,
            timestamp_ns,
            flags,
            crc32,
        },
        header_len,
    })
}

/// The payload slice declared by a decoded header, or `None` when the buffer
/// is shorter than the header claims to occupy.
pub fn payload_of<'a>(data: &'a [u8], decoded: &DecodedHeader) -> Option<&'a [u8]> {
    let end = decoded.header_len.checked_add(decoded.header.size as usize)?;
    data.get(decoded.header_len..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_round_trip() {
        let encoded = encode_message(MessageType::MarketTick, b"payload", 42);
        let decoded = decode_header(&encoded).unwrap();

        assert_eq!(decoded.header_len, HEADER_LEN_V1);
        assert_eq!(decoded.header.version, PROTOCOL_VERSION_V1);
        assert_eq!(decoded.header.msg_type, MessageType::MarketTick as u16);
        assert_eq!(decoded.header.size, 7);
        assert_eq!(decoded.header.timestamp_ns, 42);
        assert_eq!(payload_of(&encoded, &decoded).unwrap(), b"payload");
    }

    #[test]
    fn test_v2_round_trip_with_crc() {
        let encoded = encode_message_v2(MessageType::Trade, b"abc", 7, FLAG_HAS_CRC32);
        let decoded = decode_header(&encoded).unwrap();

        assert_eq!(decoded.header_len, HEADER_LEN_V2);
        assert_eq!(decoded.header.flags, FLAG_HAS_CRC32);
        assert_eq!(decoded.header.crc32, compute_crc32(b"abc"));
        assert_eq!(payload_of(&encoded, &decoded).unwrap(), b"abc");
    }

    #[test]
    fn test_short_buffer_rejected() {
        let encoded = encode_message(MessageType::Order, b"x", 0);
        assert!(matches!(
            decode_header(&encoded[..10]),
            Err(ProtocolError::TooShort { .. })
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut encoded = encode_message(MessageType::Order, b"x", 0);
        encoded[0] = 9;
        assert_eq!(decode_header(&encoded), Err(ProtocolError::UnknownVersion(9)));
    }

    #[test]
    fn test_size_overrun_rejected() {
        let mut encoded = encode_message(MessageType::Order, b"xyz", 0);
        encoded[4] = 200; // declared size now exceeds the buffer
        assert!(matches!(
            decode_header(&encoded),
            Err(ProtocolError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_corrupted_payload_fails_checksum() {
        let mut encoded = encode_message_v2(MessageType::MarketTick, b"market", 0, FLAG_HAS_CRC32);
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        assert!(matches!(
            decode_header(&encoded),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_unflagged_v2_skips_checksum() {
        let mut encoded = encode_message_v2(MessageType::MarketTick, b"market", 0, 0);
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        assert!(decode_header(&encoded).is_ok());
    }
}

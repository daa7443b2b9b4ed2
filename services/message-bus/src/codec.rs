//! Market tick wire codec
//!
//! Two encodings coexist, selected by the envelope version:
//!
//! - **V1**: the fixed 64-byte tick image, NUL-padded strings, matching the
//!   cache-line layout used by the legacy feed producers:
//!   `[ts: u64][price: f64][qty: f64][symbol: 16 B][source: 8 B][side: u8][pad: 15 B]`
//! - **V2**: a compact length-prefixed layout with an optional payload CRC:
//!   `[ts: u64][price: f64][qty: f64][side: u8][sym_len: u8][sym][src_len: u8][src]`
//!
//! Decoders accept both by dispatching on the decoded header version.

use thiserror::Error;

use types::tick::{SOURCE_LEN, SYMBOL_LEN};
use types::{MarketTick, Side};

use crate::protocol::{
    self, MessageType, ProtocolError, FLAG_HAS_CRC32, PROTOCOL_VERSION_V1, PROTOCOL_VERSION_V2,
};

/// Size of the fixed V1 tick payload.
pub const TICK_WIRE_LEN_V1: usize = 64;

const SIDE_BUY: u8 = 1;
const SIDE_SELL: u8 = 2;

/// Tick encode/decode failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("unexpected message type {0}")]
    UnexpectedType(u16),

    #[error("payload truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("invalid side byte {0}")]
    InvalidSide(u8),

    #[error("symbol or source is not valid UTF-8")]
    InvalidText,
}

fn side_to_wire(side: Side) -> u8 {
    match side {
        Side::Buy => SIDE_BUY,
        Side::Sell => SIDE_SELL,
    }
}

fn side_from_wire(raw: u8) -> Result<Side, CodecError> {
    match raw {
        SIDE_BUY => Ok(Side::Buy),
        SIDE_SELL => Ok(Side::Sell),
        other => Err(CodecError::InvalidSide(other)),
    }
}

/// Copy a string into a fixed NUL-padded field, truncating to `len - 1`
/// meaningful bytes.
fn write_padded(buf: &mut [u8], text: &str, len: usize) {
    let bytes = text.as_bytes();
    let take = bytes.len().min(len - 1);
    buf[..take].copy_from_slice(&bytes[..take]);
}

fn read_padded(buf: &[u8]) -> Result<String, CodecError> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..end])
        .map(str::to_owned)
        .map_err(|_| CodecError::InvalidText)
}

/// Encode a tick as a V1 envelope around the fixed 64-byte image.
pub fn encode_market_tick(tick: &MarketTick) -> Vec<u8> {
    let mut payload = [0u8; TICK_WIRE_LEN_V1];
    payload[0..8].copy_from_slice(&tick.timestamp_ns.to_le_bytes());
    payload[8..16].copy_from_slice(&tick.price.to_le_bytes());
    payload[16..24].copy_from_slice(&tick.quantity.to_le_bytes());
    write_padded(&mut payload[24..24 + SYMBOL_LEN], &tick.symbol, SYMBOL_LEN);
    write_padded(&mut payload[40..40 + SOURCE_LEN], &tick.source, SOURCE_LEN);
    payload[48] = side_to_wire(tick.side);

    protocol::encode_message(MessageType::MarketTick, &payload, tick.timestamp_ns)
}

/// Encode a tick as a V2 envelope around the length-prefixed layout,
/// optionally protected by a payload CRC.
pub fn encode_market_tick_v2(tick: &MarketTick, with_crc: bool) -> Vec<u8> {
    let symbol = tick.symbol.as_bytes();
    let source = tick.source.as_bytes();
    let sym_len = symbol.len().min(SYMBOL_LEN - 1);
    let src_len = source.len().min(SOURCE_LEN - 1);

    let mut payload = Vec::with_capacity(8 + 8 + 8 + 1 + 1 + sym_len + 1 + src_len);
    payload.extend_from_slice(&tick.timestamp_ns.to_le_bytes());
    payload.extend_from_slice(&tick.price.to_le_bytes());
    payload.extend_from_slice(&tick.quantity.to_le_bytes());
    payload.push(side_to_wire(tick.side));
    payload.push(sym_len as u8);
    payload.extend_from_slice(&symbol[..sym_len]);
    payload.push(src_len as u8);
    payload.extend_from_slice(&source[..src_len]);

    let flags = if with_crc { FLAG_HAS_CRC32 } else { 0 };
    protocol::encode_message_v2(MessageType::MarketTick, &payload, tick.timestamp_ns, flags)
}

/// Decode a tick from a framed buffer, dispatching on the envelope version.
pub fn decode_market_tick(data: &[u8]) -> Result<MarketTick, CodecError> {
    let decoded = protocol::decode_header(data)?;

    if decoded.header.msg_type != MessageType::MarketTick as u16 {
        return Err(CodecError::UnexpectedType(decoded.header.msg_type));
    }

    let payload = protocol::payload_of(data, &decoded).ok_or(CodecError::Truncated {
        need: decoded.header_len + decoded.header.size as usize,
        have: data.len(),
    })?;

    match decoded.header.version {
        PROTOCOL_VERSION_V1 => decode_v1_payload(payload),
        PROTOCOL_VERSION_V2 => decode_v2_payload(payload),
        other => Err(CodecError::Protocol(ProtocolError::UnknownVersion(other))),
    }
}

fn decode_v1_payload(payload: &[u8]) -> Result<MarketTick, CodecError> {
    if payload.len() != TICK_WIRE_LEN_V1 {
        return Err(CodecError::Truncated {
            need: TICK_WIRE_LEN_V1,
            have: payload.len(),
        });
    }

    Ok(MarketTick {
        timestamp_ns: u64::from_le_bytes(payload[0..8].try_into().expect("length checked")),
        price: f64::from_le_bytes(payload[8..16].try_into().expect("length checked")),
        quantity: f64::from_le_bytes(payload[16..24].try_into().expect("length checked")),
        symbol: read_padded(&payload[24..24 + SYMBOL_LEN])?,
        source: read_padded(&payload[40..40 + SOURCE_LEN])?,
        side: side_from_wire(payload[48])?,
    })
}

fn decode_v2_payload(payload: &[u8]) -> Result<MarketTick, CodecError> {
    // Fixed prefix: ts + price + qty + side + sym_len
    let mut need = 8 + 8 + 8 + 1 + 1;
    if payload.len() < need {
        return Err(CodecError::Truncated {
            need,
            have: payload.len(),
        });
    }

    let timestamp_ns = u64::from_le_bytes(payload[0..8].try_into().expect("length checked"));
    let price = f64::from_le_bytes(payload[8..16].try_into().expect("length checked"));
    let quantity = f64::from_le_bytes(payload[16..24].try_into().expect("length checked"));
    let side = side_from_wire(payload[24])?;

    let sym_len = payload[25] as usize;
    need += sym_len + 1;
    if payload.len() < need {
        return Err(CodecError::Truncated {
            need,
            have: payload.len(),
        });
    }
    let symbol = std::str::from_utf8(&payload[26..26 + sym_len])
        .map_err(|_| CodecError::InvalidText)?
        .to_owned();

    let src_len = payload[26 + sym_len] as usize;
    need += src_len;
    if payload.len() < need {
        return Err(CodecError::Truncated {
            need,
            have: payload.len(),
        });
    }
    let src_start = 27 + sym_len;
    let source = std::str::from_utf8(&payload[src_start..src_start + src_len])
        .map_err(|_| CodecError::InvalidText)?
        .to_owned();

    Ok(MarketTick {
        timestamp_ns,
        price,
        quantity,
        symbol,
        source,
        side,
    })
}

use bytes::{Buf, BufMut, Bytes};

use crate::error::{Result, WireError};
use crate::tag::{Tag, WireType};
use crate::varint::{decode_varint, encode_varint};

/// Largest length prefix accepted for a length-delimited value: 2 GiB - 1.
///
/// Lengths are carried as varints up to 64 bits wide, but the format caps
/// message size at what a signed 32-bit length can describe.
pub const MAX_DELIMITED_LEN: u64 = i32::MAX as u64;

/// Write a fixed32 value (little-endian).
pub fn encode_fixed32(value: u32, dst: &mut impl BufMut) {
    dst.put_u32_le(value);
}

/// Write a fixed64 value (little-endian).
pub fn encode_fixed64(value: u64, dst: &mut impl BufMut) {
    dst.put_u64_le(value);
}

/// Read a fixed32 value from the front of `src`.
pub fn decode_fixed32(src: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = src
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or(WireError::TruncatedInput {
            needed: 4,
            available: src.len(),
        })?;
    Ok(u32::from_le_bytes(bytes))
}

/// Read a fixed64 value from the front of `src`.
pub fn decode_fixed64(src: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = src
        .get(..8)
        .and_then(|s| s.try_into().ok())
        .ok_or(WireError::TruncatedInput {
            needed: 8,
            available: src.len(),
        })?;
    Ok(u64::from_le_bytes(bytes))
}

/// Validate a decoded length prefix and convert it to `usize`.
pub fn check_length(len: u64) -> Result<usize> {
    if len > MAX_DELIMITED_LEN {
        return Err(WireError::LengthOverflow(len));
    }
    usize::try_from(len).map_err(|_| WireError::LengthOverflow(len))
}

/// Write a length-delimited value: varint length, then the payload.
///
/// Wire format:
/// ```text
/// ┌────────────────────┬──────────────────┐
/// │ Length (varint)    │ Payload          │
/// │ 1-5 bytes          │ (Length bytes)   │
/// └────────────────────┴──────────────────┘
/// ```
pub fn encode_length_delimited(payload: &[u8], dst: &mut impl BufMut) -> Result<()> {
    let len = payload.len() as u64;
    if len > MAX_DELIMITED_LEN {
        return Err(WireError::LengthOverflow(len));
    }
    encode_varint(len, dst);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a length-delimited value from the front of `src`.
///
/// The payload is split off without copying. On error `src` is untouched.
pub fn decode_length_delimited(src: &mut Bytes) -> Result<Bytes> {
    let (len, prefix) = decode_varint(src.as_ref())?;
    let len = check_length(len)?;
    let available = src.len() - prefix;
    if len > available {
        return Err(WireError::TruncatedInput {
            needed: len,
            available,
        });
    }
    src.advance(prefix);
    Ok(src.split_to(len))
}

/// Write a complete field header for `field_number` with `wire_type`.
pub fn encode_key(field_number: u32, wire_type: WireType, dst: &mut impl BufMut) -> Result<()> {
    Tag::new(field_number, wire_type)?.encode(dst);
    Ok(())
}

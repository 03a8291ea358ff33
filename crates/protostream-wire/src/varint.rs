//! Base-128 varints and zigzag mapping.
//!
//! Groups of 7 bits are emitted least-significant first; the high bit of
//! each byte is the continuation flag. A 64-bit value never needs more than
//! [`MAX_VARINT_LEN`] bytes, and the last of those may only carry bit 63.

use bytes::BufMut;

use crate::error::{Result, WireError};

/// Longest valid varint encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Encode `value` as a varint.
pub fn encode_varint(mut value: u64, dst: &mut impl BufMut) {
    while value >= 0x80 {
        dst.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Number of bytes [`encode_varint`] writes for `value`.
pub fn encoded_len_varint(value: u64) -> usize {
    // Bits needed, rounded up to 7-bit groups; zero still takes one byte.
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decode a varint from the front of `src`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(src: &[u8]) -> Result<(u64, usize)> {
    let mut acc = VarintAccumulator::default();
    for &byte in src.iter().take(MAX_VARINT_LEN) {
        if let Some(value) = acc.push(byte)? {
            return Ok((value, acc.len()));
        }
    }
    Err(WireError::MalformedVarint)
}

/// Incremental varint decoder fed one byte at a time.
///
/// Shared by slice decoding and by the streaming readers in
/// [`crate::source`], so both reject exactly the same inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct VarintAccumulator {
    value: u64,
    len: usize,
}

impl VarintAccumulator {
    /// Feed the next byte. Returns the finished value once a byte without
    /// the continuation bit arrives.
    pub fn push(&mut self, byte: u8) -> Result<Option<u64>> {
        if self.len == MAX_VARINT_LEN - 1 && byte > 1 {
            // Byte 10 holds bit 63 only.
            return Err(WireError::MalformedVarint);
        }
        self.value |= u64::from(byte & 0x7f) << (7 * self.len);
        self.len += 1;
        if byte & 0x80 == 0 {
            Ok(Some(self.value))
        } else {
            Ok(None)
        }
    }

    /// Bytes consumed so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True before the first byte.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Map a signed 32-bit value onto an unsigned one, small magnitudes first.
pub fn zigzag_encode32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Inverse of [`zigzag_encode32`].
pub fn zigzag_decode32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Map a signed 64-bit value onto an unsigned one, small magnitudes first.
pub fn zigzag_encode64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag_encode64`].
pub fn zigzag_decode64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use proptest::prelude::*;

    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_varint(value, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn boundary_values_roundtrip() {
        for value in [0u64, 1, 127, 128, 300, (1 << 63) - 1, 1 << 63, u64::MAX] {
            let bytes = encode(value);
            assert_eq!(bytes.len(), encoded_len_varint(value));
            assert_eq!(decode_varint(&bytes).unwrap(), (value, bytes.len()));
        }
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode(0), [0x00]);
        assert_eq!(encode(127), [0x7f]);
        assert_eq!(encode(128), [0x80, 0x01]);
        assert_eq!(encode(300), [0xac, 0x02]);
        assert_eq!(
            encode(u64::MAX),
            [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]
        );
    }

    #[test]
    fn decode_stops_at_terminator() {
        let (value, used) = decode_varint(&[0xac, 0x02, 0xff, 0xff]).unwrap();
        assert_eq!(value, 300);
        assert_eq!(used, 2);
    }

    #[test]
    fn rejects_unterminated_input() {
        assert!(matches!(decode_varint(&[]), Err(WireError::MalformedVarint)));
        assert!(matches!(
            decode_varint(&[0x80, 0x80]),
            Err(WireError::MalformedVarint)
        ));
    }

    #[test]
    fn rejects_eleven_byte_varint() {
        let bytes = [0x80u8; 11];
        assert!(matches!(
            decode_varint(&bytes),
            Err(WireError::MalformedVarint)
        ));
    }

    #[test]
    fn rejects_overflowing_tenth_byte() {
        let mut bytes = vec![0xffu8; 9];
        bytes.push(0x02);
        assert!(matches!(
            decode_varint(&bytes),
            Err(WireError::MalformedVarint)
        ));

        let mut continued = vec![0xffu8; 9];
        continued.push(0x81);
        assert!(matches!(
            decode_varint(&continued),
            Err(WireError::MalformedVarint)
        ));
    }

    #[test]
    fn negative_int64_uses_ten_bytes() {
        let bytes = encode(-1i64 as u64);
        assert_eq!(bytes.len(), MAX_VARINT_LEN);
        let (value, _) = decode_varint(&bytes).unwrap();
        assert_eq!(value as i64, -1);
    }

    #[test]
    fn zigzag_known_values() {
        assert_eq!(zigzag_encode32(0), 0);
        assert_eq!(zigzag_encode32(-1), 1);
        assert_eq!(zigzag_encode32(1), 2);
        assert_eq!(zigzag_encode32(-2), 3);
        assert_eq!(zigzag_encode32(i32::MAX), u32::MAX - 1);
        assert_eq!(zigzag_encode32(i32::MIN), u32::MAX);
        assert_eq!(zigzag_encode64(i64::MIN), u64::MAX);
    }

    proptest! {
        #[test]
        fn varint_roundtrips(value in any::<u64>()) {
            let bytes = encode(value);
            prop_assert_eq!(decode_varint(&bytes).unwrap(), (value, bytes.len()));
        }

        #[test]
        fn zigzag32_is_invertible(n in any::<i32>()) {
            prop_assert_eq!(zigzag_decode32(zigzag_encode32(n)), n);
        }

        #[test]
        fn zigzag64_is_invertible(n in any::<i64>()) {
            prop_assert_eq!(zigzag_decode64(zigzag_encode64(n)), n);
        }
    }
}

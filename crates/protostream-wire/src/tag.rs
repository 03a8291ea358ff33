use std::fmt;

use bytes::BufMut;

use crate::error::{Result, WireError};
use crate::varint::encode_varint;

/// Largest field number a tag can carry (2^29 - 1).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// The six wire types of the protobuf binary format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
}

impl WireType {
    /// Resolve the low three bits of a tag.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            3 => Some(Self::StartGroup),
            4 => Some(Self::EndGroup),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }

    /// Bit mask of this wire type, for building sets of acceptable types.
    pub fn mask(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Varint => "varint",
            Self::Fixed64 => "fixed64",
            Self::LengthDelimited => "length-delimited",
            Self::StartGroup => "start-group",
            Self::EndGroup => "end-group",
            Self::Fixed32 => "fixed32",
        };
        f.write_str(name)
    }
}

/// A field tag: field number plus wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub field_number: u32,
    pub wire_type: WireType,
}

impl Tag {
    /// Build a tag, rejecting field numbers outside `1..=MAX_FIELD_NUMBER`.
    pub fn new(field_number: u32, wire_type: WireType) -> Result<Self> {
        if field_number == 0 || field_number > MAX_FIELD_NUMBER {
            return Err(WireError::InvalidTag(
                (u64::from(field_number) << 3) | u64::from(wire_type as u8),
            ));
        }
        Ok(Self {
            field_number,
            wire_type,
        })
    }

    /// Split a raw tag value into its parts.
    pub fn decode(raw: u64) -> Result<Self> {
        let wire_type =
            WireType::from_bits((raw & 0x7) as u8).ok_or(WireError::InvalidTag(raw))?;
        let field_number = raw >> 3;
        if field_number == 0 || field_number > u64::from(MAX_FIELD_NUMBER) {
            return Err(WireError::InvalidTag(raw));
        }
        Ok(Self {
            field_number: field_number as u32,
            wire_type,
        })
    }

    /// The raw `(field_number << 3) | wire_type` value.
    pub fn raw(self) -> u64 {
        (u64::from(self.field_number) << 3) | u64::from(self.wire_type as u8)
    }

    /// Write the tag as a varint.
    pub fn encode(self, dst: &mut impl BufMut) {
        encode_varint(self.raw(), dst);
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field_number, self.wire_type)
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    #[test]
    fn tag_packs_number_and_type() {
        let tag = Tag::new(1, WireType::Varint).unwrap();
        assert_eq!(tag.raw(), 0x08);

        let tag = Tag::new(2, WireType::LengthDelimited).unwrap();
        assert_eq!(tag.raw(), 0x12);

        let mut buf = BytesMut::new();
        Tag::new(16, WireType::Fixed32).unwrap().encode(&mut buf);
        assert_eq!(buf.as_ref(), &[0x85, 0x01]);
    }

    #[test]
    fn decode_splits_raw_value() {
        let tag = Tag::decode(0x1a).unwrap();
        assert_eq!(tag.field_number, 3);
        assert_eq!(tag.wire_type, WireType::LengthDelimited);
    }

    #[test]
    fn field_number_bounds() {
        assert!(Tag::new(MAX_FIELD_NUMBER, WireType::Varint).is_ok());
        assert!(matches!(
            Tag::new(0, WireType::Varint),
            Err(WireError::InvalidTag(_))
        ));
        assert!(matches!(
            Tag::new(MAX_FIELD_NUMBER + 1, WireType::Varint),
            Err(WireError::InvalidTag(_))
        ));
        assert!(matches!(Tag::decode(0x00), Err(WireError::InvalidTag(0))));
        assert!(Tag::decode(u64::from(MAX_FIELD_NUMBER + 1) << 3).is_err());
    }

    #[test]
    fn undefined_wire_types_rejected() {
        assert!(matches!(Tag::decode(0x0e), Err(WireError::InvalidTag(0x0e))));
        assert!(matches!(Tag::decode(0x0f), Err(WireError::InvalidTag(0x0f))));
    }

    #[test]
    fn wire_type_masks_are_distinct() {
        let all = [
            WireType::Varint,
            WireType::Fixed64,
            WireType::LengthDelimited,
            WireType::StartGroup,
            WireType::EndGroup,
            WireType::Fixed32,
        ];
        let combined = all.iter().fold(0u8, |acc, wt| acc | wt.mask());
        assert_eq!(combined, 0b0011_1111);
    }
}

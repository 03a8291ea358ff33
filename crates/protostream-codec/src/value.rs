use std::fmt;

use bytes::Bytes;
use protostream_wire::{decode_varint, Tag};

use crate::message::DynamicMessage;

/// A decoded scalar, or a scalar to encode.
///
/// The variant follows the in-memory representation, not the wire encoding:
/// `int32`, `sint32` and `sfixed32` all decode to [`Scalar::I32`].
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    /// Enum value, named or not.
    Enum(i32),
    String(String),
    Bytes(Bytes),
}

impl Scalar {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Bool(_) => "bool",
            Self::Enum(_) => "enum",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) | Self::Enum(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => write!(f, "{v:?}"),
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Scalar {
            fn from(value: $ty) -> Self {
                Self::$variant(value.into())
            }
        }

        impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                Self::Scalar(Scalar::from(value))
            }
        })*
    };
}

scalar_from! {
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    String => String,
    &str => String,
    Bytes => Bytes,
    Vec<u8> => Bytes,
}

/// Value of one occurrence of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Scalar),
    Message(DynamicMessage),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            Self::Message(_) => None,
        }
    }

    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Self::Message(message) => Some(message),
            Self::Scalar(_) => None,
        }
    }
}

impl From<Scalar> for FieldValue {
    fn from(scalar: Scalar) -> Self {
        Self::Scalar(scalar)
    }
}

impl From<DynamicMessage> for FieldValue {
    fn from(message: DynamicMessage) -> Self {
        Self::Message(message)
    }
}

/// A field the schema does not define, kept as the bytes it arrived in.
///
/// `tag` holds the tag varint exactly as read. `payload` holds everything
/// after it: the varint, the fixed-width value, the length prefix and its
/// bytes, or a group's contents through the closing end-group tag.
/// Writing `tag` then `payload` reproduces the original field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField {
    pub tag: Bytes,
    pub payload: Bytes,
}

impl UnknownField {
    pub fn new(tag: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        Self {
            tag: tag.into(),
            payload: payload.into(),
        }
    }

    /// Field number carried by the tag, if the tag bytes parse.
    pub fn field_number(&self) -> Option<u32> {
        let (raw, _) = decode_varint(&self.tag).ok()?;
        Tag::decode(raw).ok().map(|tag| tag.field_number)
    }

    /// Encoded size of the field.
    pub fn len(&self) -> usize {
        self.tag.len() + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_empty() && self.payload.is_empty()
    }
}

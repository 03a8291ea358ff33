//! Protobuf binary wire-format primitives.
//!
//! This is the lowest layer of protostream and knows nothing about message
//! schemas. It covers:
//! - Base-128 varints and zigzag mapping for signed integers
//! - Little-endian fixed32/fixed64 values
//! - Length-delimited values (varint length prefix + payload)
//! - Field tags: `(field_number << 3) | wire_type`
//!
//! The [`ByteSource`] and [`ByteSink`] traits are the injection points for
//! input and output; the decoder and encoder engines are generic over them.

pub mod codec;
pub mod error;
pub mod sink;
pub mod source;
pub mod tag;
pub mod varint;

pub use codec::{
    check_length, decode_fixed32, decode_fixed64, decode_length_delimited, encode_fixed32,
    encode_fixed64, encode_key, encode_length_delimited, MAX_DELIMITED_LEN,
};
pub use error::{Result, WireError};
pub use sink::{ByteSink, WriteSink};
pub use source::{
    read_fixed32, read_fixed64, read_length, read_raw_varint, read_tag, read_varint, ByteSource,
    RawVarint, ReadSource, SliceSource,
};
pub use tag::{Tag, WireType, MAX_FIELD_NUMBER};
pub use varint::{
    decode_varint, encode_varint, encoded_len_varint, zigzag_decode32, zigzag_decode64,
    zigzag_encode32, zigzag_encode64, MAX_VARINT_LEN,
};

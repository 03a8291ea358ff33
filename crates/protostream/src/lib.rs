//! Minimal embeddable protobuf runtime.
//!
//! protostream decodes and encodes protobuf wire data against message
//! definitions supplied at runtime, without generated code. Decoding is
//! streaming: fields are pushed to a handler as they are read.
//!
//! # Crate Structure
//!
//! - [`wire`]: varints, tags, fixed-width and length-delimited values, byte
//!   sources and sinks
//! - [`def`]: message, field and enum definitions and the registry
//! - [`codec`]: the decoder and encoder engines, handlers and message trees

/// Re-export wire-format primitives.
pub mod wire {
    pub use protostream_wire::*;
}

/// Re-export definition types.
pub mod def {
    pub use protostream_def::*;
}

/// Re-export decoder and encoder types.
pub mod codec {
    pub use protostream_codec::*;
}

pub use protostream_codec::{
    decode, encode, DecodeConfig, DecodeError, Decoder, DynamicMessage, EncodeConfig,
    EncodeError, Encoder, Flow, Handler, Scalar,
};
pub use protostream_def::{MessageId, Registry};

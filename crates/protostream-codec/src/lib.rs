//! Streaming protobuf decoding and encoding driven by a definition registry.
//!
//! The [`Decoder`] reads a message in one forward pass and pushes each field
//! to a [`Handler`]. Ready-made handlers assemble a [`DynamicMessage`]
//! ([`TreeBuilder`]), re-encode on the fly ([`StreamEncoder`]) or print
//! text ([`TextPrinter`]). The [`Encoder`] turns a [`DynamicMessage`] back
//! into wire bytes, deterministically.
//!
//! ```
//! use protostream_codec::{DynamicMessage, Scalar};
//! use protostream_def::{FieldDescriptor, MessageDef, Registry, ValueType};
//!
//! let registry = Registry::builder()
//!     .message(
//!         MessageDef::new("demo.Person")
//!             .with_field(FieldDescriptor::new(1, "id", ValueType::Int32))
//!             .with_field(FieldDescriptor::new(2, "name", ValueType::String)),
//!     )
//!     .build()?;
//! let person = registry.message_id("demo.Person").unwrap();
//!
//! let message = DynamicMessage::decode(&registry, person, &b"\x08\x96\x01\x12\x03Bob"[..])?;
//! assert_eq!(message.scalar(1), Some(&Scalar::I32(150)));
//! assert_eq!(message.encode_to_vec(&registry, person)?, b"\x08\x96\x01\x12\x03Bob");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod handler;
pub mod message;
pub mod stream;
pub mod text;
pub mod value;

pub use config::{DecodeConfig, EncodeConfig, UnknownFieldPolicy, DEFAULT_MAX_DEPTH};
pub use decoder::{decode, Decoder};
pub use encoder::{encode, Encoder};
pub use error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
pub use handler::{Flow, Handler};
pub use message::{DynamicMessage, TreeBuilder};
pub use stream::StreamEncoder;
pub use text::TextPrinter;
pub use value::{FieldValue, Scalar, UnknownField};

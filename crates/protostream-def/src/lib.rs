//! Message, field and enum definitions.
//!
//! Definitions describe the schema the decoder and encoder engines walk.
//! They are collected in a [`RegistryBuilder`], validated once, and frozen
//! into a [`Registry`]: an arena indexed by [`MessageId`] / [`EnumId`] that
//! is immutable afterwards and safe to share across threads.
//!
//! Every type reference is resolved at build time, so encode and decode
//! never fail because of an inconsistent schema.

pub mod config;
pub mod enums;
pub mod error;
pub mod field;
pub mod loader;
pub mod message;
pub mod registry;
pub mod types;

pub use config::LoaderConfig;
pub use enums::EnumDef;
pub use error::{DefError, Result};
pub use field::{FieldDescriptor, TypeRef};
pub use message::MessageDef;
pub use registry::{EnumId, MessageId, Registry, RegistryBuilder};
pub use types::{Cardinality, ValueType};

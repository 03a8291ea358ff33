//! Schema-driven encoder.
//!
//! Fields are written in declared order, repeated values in insertion order,
//! and unknown fields last, so a given message and schema always produce the
//! same bytes. Each submessage is serialized into a scratch buffer first so
//! its length prefix can be written ahead of it.

use bytes::{BufMut, BytesMut};
use protostream_def::{FieldDescriptor, MessageDef, MessageId, Registry, ValueType};
use protostream_wire::{
    encode_fixed32, encode_fixed64, encode_key, encode_length_delimited, encode_varint,
    zigzag_encode32, zigzag_encode64, ByteSink, WireType,
};
use tracing::trace;

use crate::config::EncodeConfig;
use crate::error::{EncodeError, EncodeResult};
use crate::message::DynamicMessage;
use crate::value::{FieldValue, Scalar};

/// Encoder bound to a registry.
#[derive(Debug, Clone)]
pub struct Encoder<'r> {
    registry: &'r Registry,
    config: EncodeConfig,
}

impl<'r> Encoder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_config(registry, EncodeConfig::default())
    }

    pub fn with_config(registry: &'r Registry, config: EncodeConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &EncodeConfig {
        &self.config
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Serialize `value` as message `id` and hand the bytes to `sink`.
    ///
    /// The message is fully validated before the sink sees anything, so a
    /// failed encode writes nothing.
    pub fn encode<K: ByteSink>(
        &self,
        id: MessageId,
        value: &DynamicMessage,
        mut sink: K,
    ) -> EncodeResult<()> {
        let mut buf = BytesMut::new();
        self.encode_into(id, value, &mut buf)?;
        sink.write_bytes(&buf)?;
        Ok(())
    }

    pub fn encode_to_vec(&self, id: MessageId, value: &DynamicMessage) -> EncodeResult<Vec<u8>> {
        let mut buf = BytesMut::new();
        self.encode_into(id, value, &mut buf)?;
        Ok(buf.to_vec())
    }

    /// Append the serialized message to `buf`. On error `buf` may hold a
    /// partial message.
    pub fn encode_into(
        &self,
        id: MessageId,
        value: &DynamicMessage,
        buf: &mut BytesMut,
    ) -> EncodeResult<()> {
        let start = buf.len();
        self.write_message(id, value, buf, 0)?;
        trace!(message_type = %id, bytes = buf.len() - start, "message encoded");
        Ok(())
    }

    fn definition(&self, id: MessageId) -> EncodeResult<&'r MessageDef> {
        self.registry
            .message(id)
            .ok_or(EncodeError::UnknownMessage(id))
    }

    fn write_message(
        &self,
        id: MessageId,
        value: &DynamicMessage,
        buf: &mut BytesMut,
        depth: usize,
    ) -> EncodeResult<()> {
        if depth > self.config.max_depth {
            return Err(EncodeError::NestingTooDeep {
                limit: self.config.max_depth,
            });
        }
        let def = self.definition(id)?;

        if let Some(number) = value.numbers().find(|n| def.lookup_field(*n).is_none()) {
            return Err(EncodeError::UnknownField {
                message: def.name().to_owned(),
                number,
            });
        }

        for field in def.fields() {
            let values = value.get(field.number());
            if values.is_empty() {
                if field.is_required() && self.config.check_required {
                    return Err(EncodeError::MissingRequired {
                        message: def.name().to_owned(),
                        field: field.name().to_owned(),
                    });
                }
                continue;
            }
            if !field.is_repeated() && values.len() > 1 {
                return Err(EncodeError::MultipleValues {
                    field: field.name().to_owned(),
                });
            }

            if self.writes_packed(field) {
                let mut run = BytesMut::new();
                for value in values {
                    write_payload(field, scalar_of(field, value)?, &mut run)?;
                }
                encode_key(field.number(), WireType::LengthDelimited, buf)?;
                encode_length_delimited(&run, buf)?;
            } else {
                for value in values {
                    self.write_field(field, value, buf, depth)?;
                }
            }
        }

        for unknown in value.unknown_fields() {
            buf.put_slice(&unknown.tag);
            buf.put_slice(&unknown.payload);
        }
        Ok(())
    }

    fn writes_packed(&self, field: &FieldDescriptor) -> bool {
        field.is_repeated()
            && field.value_type().is_packable()
            && (field.is_packed() || self.config.pack_repeated)
    }

    fn write_field(
        &self,
        field: &FieldDescriptor,
        value: &FieldValue,
        buf: &mut BytesMut,
        depth: usize,
    ) -> EncodeResult<()> {
        match (field.value_type(), value) {
            (ValueType::Message, FieldValue::Message(message)) => {
                let mut scratch = BytesMut::new();
                self.write_message(nested_id(field)?, message, &mut scratch, depth + 1)?;
                encode_key(field.number(), WireType::LengthDelimited, buf)?;
                encode_length_delimited(&scratch, buf)?;
            }
            (ValueType::Group, FieldValue::Message(message)) => {
                encode_key(field.number(), WireType::StartGroup, buf)?;
                self.write_message(nested_id(field)?, message, buf, depth + 1)?;
                encode_key(field.number(), WireType::EndGroup, buf)?;
            }
            (value_type, FieldValue::Scalar(scalar)) if !value_type.is_submessage() => {
                encode_key(field.number(), field.wire_type(), buf)?;
                write_payload(field, scalar, buf)?;
            }
            _ => return Err(mismatch(field)),
        }
        Ok(())
    }
}

/// Serialize `value` as message `id` with the default configuration.
pub fn encode<K: ByteSink>(
    registry: &Registry,
    id: MessageId,
    value: &DynamicMessage,
    sink: K,
) -> EncodeResult<()> {
    Encoder::new(registry).encode(id, value, sink)
}

fn mismatch(field: &FieldDescriptor) -> EncodeError {
    EncodeError::ValueTypeMismatch {
        field: field.name().to_owned(),
        expected: field.value_type(),
    }
}

fn nested_id(field: &FieldDescriptor) -> EncodeResult<MessageId> {
    field.message_type().ok_or_else(|| mismatch(field))
}

fn scalar_of<'v>(field: &FieldDescriptor, value: &'v FieldValue) -> EncodeResult<&'v Scalar> {
    value.as_scalar().ok_or_else(|| mismatch(field))
}

/// Write the payload of one scalar, without its tag.
fn write_payload(
    field: &FieldDescriptor,
    scalar: &Scalar,
    buf: &mut impl BufMut,
) -> EncodeResult<()> {
    use Scalar as S;
    use ValueType as T;

    match (field.value_type(), scalar) {
        // Negative int32 and enum values are sign-extended to ten bytes.
        (T::Int32, S::I32(v)) | (T::Enum, S::I32(v) | S::Enum(v)) => {
            encode_varint(i64::from(*v) as u64, buf)
        }
        (T::Int64, S::I64(v)) => encode_varint(*v as u64, buf),
        (T::Uint32, S::U32(v)) => encode_varint(u64::from(*v), buf),
        (T::Uint64, S::U64(v)) => encode_varint(*v, buf),
        (T::Sint32, S::I32(v)) => encode_varint(u64::from(zigzag_encode32(*v)), buf),
        (T::Sint64, S::I64(v)) => encode_varint(zigzag_encode64(*v), buf),
        (T::Bool, S::Bool(v)) => encode_varint(u64::from(*v), buf),
        (T::Fixed32, S::U32(v)) => encode_fixed32(*v, buf),
        (T::Sfixed32, S::I32(v)) => encode_fixed32(*v as u32, buf),
        (T::Float, S::F32(v)) => encode_fixed32(v.to_bits(), buf),
        (T::Fixed64, S::U64(v)) => encode_fixed64(*v, buf),
        (T::Sfixed64, S::I64(v)) => encode_fixed64(*v as u64, buf),
        (T::Double, S::F64(v)) => encode_fixed64(v.to_bits(), buf),
        (T::String, S::String(v)) => encode_length_delimited(v.as_bytes(), buf)?,
        (T::Bytes, S::Bytes(v)) => encode_length_delimited(v, buf)?,
        _ => return Err(mismatch(field)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use proptest::prelude::*;
    use protostream_def::EnumDef;
    use protostream_wire::WriteSink;

    use super::*;
    use crate::value::UnknownField;

    fn registry() -> Registry {
        Registry::builder()
            .message(
                MessageDef::new("test.Person")
                    .with_field(FieldDescriptor::new(1, "id", ValueType::Int32).required())
                    .with_field(FieldDescriptor::new(2, "name", ValueType::String))
                    .with_field(FieldDescriptor::new(3, "scores", ValueType::Sint32).repeated())
                    .with_field(
                        FieldDescriptor::new(4, "samples", ValueType::Fixed32)
                            .repeated()
                            .packed(),
                    )
                    .with_field(
                        FieldDescriptor::new(5, "friend", ValueType::Message)
                            .with_type_name("test.Person"),
                    )
                    .with_field(
                        FieldDescriptor::new(6, "grp", ValueType::Group)
                            .with_type_name("test.Person"),
                    )
                    .with_field(FieldDescriptor::new(7, "blob", ValueType::Bytes))
                    .with_field(FieldDescriptor::new(8, "ratio", ValueType::Double))
                    .with_field(FieldDescriptor::new(9, "big", ValueType::Uint64))
                    .with_field(FieldDescriptor::new(10, "alive", ValueType::Bool))
                    .with_field(
                        FieldDescriptor::new(11, "kind", ValueType::Enum)
                            .with_type_name("test.Kind"),
                    )
                    .with_field(
                        FieldDescriptor::new(12, "children", ValueType::Message)
                            .with_type_name("test.Person")
                            .repeated(),
                    ),
            )
            .enumeration(
                EnumDef::new("test.Kind")
                    .with_value("ZERO", 0)
                    .with_value("ONE", 1)
                    .with_value("NEGATIVE", -3),
            )
            .message(
                MessageDef::new("test.Reversed")
                    .with_field(FieldDescriptor::new(2, "b", ValueType::Int32))
                    .with_field(FieldDescriptor::new(1, "a", ValueType::Int32)),
            )
            .build()
            .unwrap()
    }

    fn encode_person(message: &DynamicMessage) -> EncodeResult<Vec<u8>> {
        let registry = registry();
        let id = registry.message_id("test.Person").unwrap();
        Encoder::new(&registry).encode_to_vec(id, message)
    }

    #[test]
    fn encodes_canonical_person() {
        let message = DynamicMessage::new().with(1, 150i32).with(2, "Bob");
        assert_eq!(encode_person(&message).unwrap(), b"\x08\x96\x01\x12\x03Bob");
    }

    #[test]
    fn empty_message_encodes_to_nothing() {
        assert!(encode_person(&DynamicMessage::new()).unwrap().is_empty());
    }

    #[test]
    fn fields_follow_declared_order() {
        let registry = registry();
        let id = registry.message_id("test.Reversed").unwrap();
        let message = DynamicMessage::new().with(1, 1i32).with(2, 2i32);
        assert_eq!(
            Encoder::new(&registry).encode_to_vec(id, &message).unwrap(),
            vec![0x10, 0x02, 0x08, 0x01]
        );
    }

    #[test]
    fn negative_int32_is_sign_extended() {
        let message = DynamicMessage::new().with(1, -1i32);
        assert_eq!(
            encode_person(&message).unwrap(),
            b"\x08\xff\xff\xff\xff\xff\xff\xff\xff\xff\x01"
        );
    }

    #[test]
    fn repeated_fields_pack_when_declared() {
        let message = DynamicMessage::new()
            .with(3, -1i32)
            .with(3, 1i32)
            .with(4, 1u32)
            .with(4, 2u32);
        assert_eq!(
            encode_person(&message).unwrap(),
            vec![
                0x18, 0x01, 0x18, 0x02, // unpacked sint32
                0x22, 0x08, 1, 0, 0, 0, 2, 0, 0, 0, // packed fixed32
            ]
        );
    }

    #[test]
    fn pack_repeated_config_packs_everything_packable() {
        let registry = registry();
        let id = registry.message_id("test.Person").unwrap();
        let config = EncodeConfig {
            pack_repeated: true,
            ..EncodeConfig::default()
        };
        let message = DynamicMessage::new().with(3, -1i32).with(3, 1i32);
        assert_eq!(
            Encoder::with_config(&registry, config)
                .encode_to_vec(id, &message)
                .unwrap(),
            vec![0x1a, 0x02, 0x01, 0x02]
        );
    }

    #[test]
    fn submessages_and_groups() {
        let inner = DynamicMessage::new().with(1, 7i32);
        let message = DynamicMessage::new()
            .with(5, inner.clone())
            .with(6, inner);
        assert_eq!(
            encode_person(&message).unwrap(),
            vec![0x2a, 0x02, 0x08, 0x07, 0x33, 0x08, 0x07, 0x34]
        );
    }

    #[test]
    fn unknown_fields_follow_known_fields() {
        let mut message = DynamicMessage::new().with(1, 1i32);
        message.push_unknown(UnknownField::new(vec![0xf8, 0x06], vec![0x2a]));
        message.push(2, "x");
        assert_eq!(
            encode_person(&message).unwrap(),
            vec![0x08, 0x01, 0x12, 0x01, b'x', 0xf8, 0x06, 0x2a]
        );
    }

    #[test]
    fn undefined_field_number_is_rejected() {
        let message = DynamicMessage::new().with(99, 1i32);
        assert!(matches!(
            encode_person(&message),
            Err(EncodeError::UnknownField { number: 99, .. })
        ));
    }

    #[test]
    fn mismatched_value_is_rejected() {
        let message = DynamicMessage::new().with(1, "not an int");
        assert!(matches!(
            encode_person(&message),
            Err(EncodeError::ValueTypeMismatch {
                expected: ValueType::Int32,
                ..
            })
        ));

        let message = DynamicMessage::new().with(5, 1i32);
        assert!(matches!(
            encode_person(&message),
            Err(EncodeError::ValueTypeMismatch { .. })
        ));
    }

    #[test]
    fn singular_field_with_two_values_is_rejected() {
        let message = DynamicMessage::new().with(2, "a").with(2, "b");
        assert!(matches!(
            encode_person(&message),
            Err(EncodeError::MultipleValues { .. })
        ));
    }

    #[test]
    fn required_fields_checked_only_on_request() {
        let registry = registry();
        let id = registry.message_id("test.Person").unwrap();
        let message = DynamicMessage::new().with(2, "anon");

        assert!(Encoder::new(&registry).encode_to_vec(id, &message).is_ok());

        let strict = EncodeConfig {
            check_required: true,
            ..EncodeConfig::default()
        };
        assert!(matches!(
            Encoder::with_config(&registry, strict).encode_to_vec(id, &message),
            Err(EncodeError::MissingRequired { .. })
        ));
    }

    #[test]
    fn nesting_limit_is_enforced() {
        let registry = registry();
        let id = registry.message_id("test.Person").unwrap();
        let deep = DynamicMessage::new().with(
            5,
            DynamicMessage::new().with(5, DynamicMessage::new().with(1, 1i32)),
        );
        let config = EncodeConfig {
            max_depth: 1,
            ..EncodeConfig::default()
        };
        assert!(matches!(
            Encoder::with_config(&registry, config).encode_to_vec(id, &deep),
            Err(EncodeError::NestingTooDeep { limit: 1 })
        ));
        assert!(Encoder::new(&registry).encode_to_vec(id, &deep).is_ok());
    }

    #[test]
    fn failed_encode_writes_nothing_to_sink() {
        let registry = registry();
        let id = registry.message_id("test.Person").unwrap();
        let message = DynamicMessage::new().with(1, 1i32).with(2, 5i32);
        let mut sink = WriteSink::new(Vec::new());
        assert!(encode(&registry, id, &message, &mut sink).is_err());
        assert_eq!(sink.written(), 0);

        let message = DynamicMessage::new().with(1, 1i32);
        encode(&registry, id, &message, &mut sink).unwrap();
        assert_eq!(sink.into_inner(), vec![0x08, 0x01]);
    }

    #[test]
    fn unknown_bytes_survive_a_round_trip() {
        let registry = registry();
        let id = registry.message_id("test.Person").unwrap();
        let input: &'static [u8] = b"\x08\x01\xf8\x06\x2a\xfa\x06\x02hi\x12\x01x";
        let message = DynamicMessage::decode(&registry, id, input).unwrap();
        assert_eq!(message.unknown_fields().len(), 2);

        let output = message.encode_to_vec(&registry, id).unwrap();
        assert_eq!(output, b"\x08\x01\x12\x01x\xf8\x06\x2a\xfa\x06\x02hi");
    }

    #[test]
    fn output_does_not_depend_on_insertion_order() {
        let registry = registry();
        let id = registry.message_id("test.Person").unwrap();
        let encoder = Encoder::new(&registry);
        let friend = DynamicMessage::new().with(1, 2i32).with(2, "amy");

        let mut first = DynamicMessage::new();
        first
            .push(1, 9i32)
            .push(3, 4i32)
            .push(3, -4i32)
            .push(5, friend.clone())
            .push(10, true)
            .push_unknown(UnknownField::new(vec![0xa0, 0x06], vec![0x01]));
        let mut second = DynamicMessage::new();
        second
            .push_unknown(UnknownField::new(vec![0xa0, 0x06], vec![0x01]))
            .push(10, true)
            .push(3, 4i32)
            .push(5, friend)
            .push(3, -4i32)
            .push(1, 9i32);

        let bytes = encoder.encode_to_vec(id, &first).unwrap();
        assert_eq!(encoder.encode_to_vec(id, &first).unwrap(), bytes);
        assert_eq!(encoder.encode_to_vec(id, &second).unwrap(), bytes);
    }

    #[test]
    fn re_encoding_decoded_output_is_stable() {
        let registry = registry();
        let id = registry.message_id("test.Person").unwrap();
        // Packed run, group, varint fields and an unknown group, out of
        // declared order.
        let input: &'static [u8] =
            b"\x22\x04\x05\x00\x00\x00\x33\x08\x01\x34\x08\x07\x18\x02\xa3\x06\x08\x01\xa4\x06";
        let first = DynamicMessage::decode(&registry, id, input)
            .unwrap()
            .encode_to_vec(&registry, id)
            .unwrap();
        let second = DynamicMessage::decode(&registry, id, first.clone())
            .unwrap()
            .encode_to_vec(&registry, id)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first,
            b"\x08\x07\x18\x02\x22\x04\x05\x00\x00\x00\x33\x08\x01\x34\xa3\x06\x08\x01\xa4\x06"
        );
    }

    fn unknown_strategy() -> impl Strategy<Value = UnknownField> {
        (
            100u32..200,
            prop_oneof![
                any::<u64>().prop_map(Ok::<u64, Vec<u8>>),
                proptest::collection::vec(any::<u8>(), 0..8).prop_map(Err::<u64, Vec<u8>>),
            ],
        )
            .prop_map(|(number, value)| {
                let mut tag = Vec::new();
                let mut payload = Vec::new();
                match value {
                    Ok(varint) => {
                        encode_varint(u64::from(number) << 3, &mut tag);
                        encode_varint(varint, &mut payload);
                    }
                    Err(bytes) => {
                        encode_varint(u64::from(number) << 3 | 2, &mut tag);
                        encode_varint(bytes.len() as u64, &mut payload);
                        payload.extend_from_slice(&bytes);
                    }
                }
                UnknownField::new(tag, payload)
            })
    }

    fn person_strategy() -> impl Strategy<Value = DynamicMessage> {
        let scalars = (
            any::<i32>(),
            proptest::option::of("[a-z]{0,8}"),
            proptest::collection::vec(any::<i32>(), 0..4),
            proptest::collection::vec(any::<u32>(), 0..4),
            proptest::option::of(proptest::collection::vec(any::<u8>(), 0..16)),
            proptest::option::of(-1.0e6f64..1.0e6),
            proptest::option::of(any::<u64>()),
            proptest::option::of(any::<bool>()),
        );
        let extras = (
            proptest::option::of(prop_oneof![Just(0), Just(1), Just(-3), any::<i32>()]),
            proptest::collection::vec(unknown_strategy(), 0..3),
        );
        let leaf = (scalars, extras).prop_map(
            |((id, name, scores, samples, blob, ratio, big, alive), (kind, unknown))| {
                let mut message = DynamicMessage::new().with(1, id);
                if let Some(name) = name {
                    message.push(2, name);
                }
                for score in scores {
                    message.push(3, score);
                }
                for sample in samples {
                    message.push(4, sample);
                }
                if let Some(blob) = blob {
                    message.push(7, Bytes::from(blob));
                }
                if let Some(ratio) = ratio {
                    message.push(8, ratio);
                }
                if let Some(big) = big {
                    message.push(9, big);
                }
                if let Some(alive) = alive {
                    message.push(10, alive);
                }
                if let Some(kind) = kind {
                    message.push(11, Scalar::Enum(kind));
                }
                for field in unknown {
                    message.push_unknown(field);
                }
                message
            },
        );
        leaf.prop_recursive(3, 24, 3, |inner| {
            (
                inner.clone(),
                proptest::option::of(inner.clone()),
                any::<bool>(),
                proptest::collection::vec(inner, 0..3),
            )
                .prop_map(|(mut outer, friend, as_group, children)| {
                    // 5 and 6 are singular: replace whatever the inner
                    // message already holds there.
                    if let Some(friend) = friend {
                        outer.set(if as_group { 6 } else { 5 }, friend);
                    }
                    for child in children {
                        outer.push(12, child);
                    }
                    outer
                })
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(message in person_strategy()) {
            let registry = registry();
            let id = registry.message_id("test.Person").unwrap();
            let bytes = Encoder::new(&registry).encode_to_vec(id, &message).unwrap();
            let decoded = DynamicMessage::decode(&registry, id, bytes).unwrap();
            prop_assert_eq!(decoded, message);
        }
    }
}

use protostream_wire::WireType;

use crate::registry::{EnumId, MessageId};
use crate::types::{Cardinality, ValueType};

/// Resolved reference from a field to another definition in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Message(MessageId),
    Enum(EnumId),
}

/// One field of a message definition.
///
/// Built with the chained setters below and handed to
/// [`crate::MessageDef::with_field`]. Type names are resolved to
/// [`TypeRef`]s when the registry is built.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    number: u32,
    name: String,
    value_type: ValueType,
    cardinality: Cardinality,
    packed: bool,
    type_name: Option<String>,
    type_ref: Option<TypeRef>,
}

impl FieldDescriptor {
    /// An optional field.
    pub fn new(number: u32, name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            number,
            name: name.into(),
            value_type,
            cardinality: Cardinality::Optional,
            packed: false,
            type_name: None,
            type_ref: None,
        }
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn repeated(self) -> Self {
        self.with_cardinality(Cardinality::Repeated)
    }

    pub fn required(self) -> Self {
        self.with_cardinality(Cardinality::Required)
    }

    /// Opt this repeated field into packed encoding.
    pub fn packed(mut self) -> Self {
        self.packed = true;
        self
    }

    /// Qualified name of the message or enum this field refers to.
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    pub fn is_required(&self) -> bool {
        self.cardinality == Cardinality::Required
    }

    /// Declared packed in the schema.
    pub fn is_packed(&self) -> bool {
        self.packed
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// The referenced definition. Always `Some` for message, group and enum
    /// fields of a built registry.
    pub fn type_ref(&self) -> Option<TypeRef> {
        self.type_ref
    }

    /// Nested message definition for message and group fields.
    pub fn message_type(&self) -> Option<MessageId> {
        match self.type_ref {
            Some(TypeRef::Message(id)) => Some(id),
            _ => None,
        }
    }

    /// Enum definition for enum fields.
    pub fn enum_type(&self) -> Option<EnumId> {
        match self.type_ref {
            Some(TypeRef::Enum(id)) => Some(id),
            _ => None,
        }
    }

    /// Wire type this field is written with when not packed.
    pub fn wire_type(&self) -> WireType {
        self.value_type.wire_type()
    }

    /// Whether a value of this field may arrive with `wire_type`.
    ///
    /// Numeric fields accept both their own wire type and a packed
    /// length-delimited run, whatever the schema's `packed` flag or the
    /// cardinality says. A run on a singular field yields each element in
    /// turn; consumers keep the last.
    pub fn accepts(&self, wire_type: WireType) -> bool {
        wire_type == self.wire_type()
            || (wire_type == WireType::LengthDelimited && self.value_type.is_packable())
    }

    pub(crate) fn set_type_ref(&mut self, type_ref: TypeRef) {
        self.type_ref = Some(type_ref);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_attributes() {
        let field = FieldDescriptor::new(4, "samples", ValueType::Sint32)
            .repeated()
            .packed();
        assert_eq!(field.number(), 4);
        assert_eq!(field.name(), "samples");
        assert!(field.is_repeated());
        assert!(field.is_packed());
        assert!(field.type_ref().is_none());
    }

    #[test]
    fn packed_wire_type_for_numeric_scalars() {
        let repeated = FieldDescriptor::new(1, "a", ValueType::Int32).repeated();
        let single = FieldDescriptor::new(2, "b", ValueType::Int32);
        let strings = FieldDescriptor::new(3, "c", ValueType::String).repeated();

        assert!(repeated.accepts(WireType::Varint));
        assert!(repeated.accepts(WireType::LengthDelimited));
        assert!(!repeated.accepts(WireType::Fixed32));
        assert!(single.accepts(WireType::Varint));
        assert!(single.accepts(WireType::LengthDelimited));
        assert!(!single.accepts(WireType::Fixed64));
        assert!(strings.accepts(WireType::LengthDelimited));
        assert!(!strings.accepts(WireType::Varint));
    }

    #[test]
    fn groups_use_start_group() {
        let group = FieldDescriptor::new(5, "g", ValueType::Group).with_type_name("pkg.G");
        assert!(group.accepts(WireType::StartGroup));
        assert!(!group.accepts(WireType::LengthDelimited));
        assert_eq!(group.type_name(), Some("pkg.G"));
    }
}

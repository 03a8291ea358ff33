use std::collections::{HashMap, HashSet};
use std::fmt;

use protostream_wire::MAX_FIELD_NUMBER;
use tracing::debug;

use crate::enums::EnumDef;
use crate::error::{DefError, Result};
use crate::field::TypeRef;
use crate::message::MessageDef;
use crate::types::ValueType;

/// Stable index of a message definition within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u32);

/// Stable index of an enum definition within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(u32);

impl MessageId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl EnumId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message#{}", self.0)
    }
}

impl fmt::Display for EnumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enum#{}", self.0)
    }
}

/// Collects definitions before validation.
///
/// Definitions may refer to each other in any order, including to
/// themselves; references are resolved by name in [`RegistryBuilder::build`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    messages: Vec<MessageDef>,
    enums: Vec<EnumDef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: MessageDef) -> &mut Self {
        self.messages.push(message);
        self
    }

    pub fn add_enum(&mut self, definition: EnumDef) -> &mut Self {
        self.enums.push(definition);
        self
    }

    pub fn message(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }

    pub fn enumeration(mut self, definition: EnumDef) -> Self {
        self.enums.push(definition);
        self
    }

    /// Validate every definition and freeze them into a [`Registry`].
    pub fn build(self) -> Result<Registry> {
        let RegistryBuilder {
            mut messages,
            enums,
        } = self;

        let mut names: HashMap<String, TypeRef> = HashMap::new();
        for (idx, message) in messages.iter().enumerate() {
            let id = TypeRef::Message(MessageId(idx as u32));
            if names.insert(message.name().to_string(), id).is_some() {
                return Err(DefError::DuplicateTypeName(message.name().to_string()));
            }
        }
        for (idx, definition) in enums.iter().enumerate() {
            let id = TypeRef::Enum(EnumId(idx as u32));
            if names.insert(definition.name().to_string(), id).is_some() {
                return Err(DefError::DuplicateTypeName(definition.name().to_string()));
            }
        }

        for message in &mut messages {
            validate_fields(message)?;
            resolve_references(message, &names)?;
        }

        debug!(
            messages = messages.len(),
            enums = enums.len(),
            "definition registry built"
        );

        Ok(Registry {
            messages,
            enums,
            names,
        })
    }
}

fn validate_fields(message: &MessageDef) -> Result<()> {
    let mut numbers = HashSet::new();
    let mut field_names = HashSet::new();

    for field in message.fields() {
        if field.number() == 0 || field.number() > MAX_FIELD_NUMBER {
            return Err(DefError::InvalidFieldNumber {
                message: message.name().to_string(),
                number: field.number(),
            });
        }
        if !numbers.insert(field.number()) {
            return Err(DefError::DuplicateFieldNumber {
                message: message.name().to_string(),
                number: field.number(),
            });
        }
        if !field_names.insert(field.name()) {
            return Err(DefError::DuplicateFieldName {
                message: message.name().to_string(),
                name: field.name().to_string(),
            });
        }
        if field.is_packed() && !(field.is_repeated() && field.value_type().is_packable()) {
            return Err(DefError::InvalidPacked {
                message: message.name().to_string(),
                field: field.name().to_string(),
            });
        }
    }
    Ok(())
}

fn resolve_references(message: &mut MessageDef, names: &HashMap<String, TypeRef>) -> Result<()> {
    let message_name = message.name().to_string();

    for field in message.fields_mut() {
        let value_type = field.value_type();
        let type_name = match (value_type.needs_type_name(), field.type_name()) {
            (false, None) => continue,
            (false, Some(_)) => {
                return Err(DefError::UnexpectedTypeName {
                    message: message_name,
                    field: field.name().to_string(),
                });
            }
            (true, None) => {
                return Err(DefError::MissingTypeName {
                    message: message_name,
                    field: field.name().to_string(),
                });
            }
            (true, Some(type_name)) => type_name,
        };

        let resolved = match (value_type, names.get(type_name)) {
            (ValueType::Enum, Some(found @ TypeRef::Enum(_))) => *found,
            (ValueType::Message | ValueType::Group, Some(found @ TypeRef::Message(_))) => *found,
            _ => {
                return Err(DefError::UnresolvedTypeReference {
                    message: message_name,
                    field: field.name().to_string(),
                    type_name: type_name.to_string(),
                });
            }
        };
        field.set_type_ref(resolved);
    }
    Ok(())
}

/// Immutable, validated set of message and enum definitions.
///
/// Definitions are stored in arenas and referenced by [`MessageId`] /
/// [`EnumId`], so recursive and mutually recursive message types need no
/// reference cycles. A registry is never mutated after
/// [`RegistryBuilder::build`]; share it by reference or `Arc` across any
/// number of concurrent decode and encode calls.
#[derive(Debug, Clone)]
pub struct Registry {
    messages: Vec<MessageDef>,
    enums: Vec<EnumDef>,
    names: HashMap<String, TypeRef>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn message(&self, id: MessageId) -> Option<&MessageDef> {
        self.messages.get(id.index())
    }

    pub fn enumeration(&self, id: EnumId) -> Option<&EnumDef> {
        self.enums.get(id.index())
    }

    /// Look up a message by qualified name.
    pub fn message_id(&self, name: &str) -> Option<MessageId> {
        match self.names.get(name) {
            Some(TypeRef::Message(id)) => Some(*id),
            _ => None,
        }
    }

    /// Look up an enum by qualified name.
    pub fn enum_id(&self, name: &str) -> Option<EnumId> {
        match self.names.get(name) {
            Some(TypeRef::Enum(id)) => Some(*id),
            _ => None,
        }
    }

    /// Messages with their ids, in registration order.
    pub fn messages(&self) -> impl Iterator<Item = (MessageId, &MessageDef)> {
        self.messages
            .iter()
            .enumerate()
            .map(|(idx, message)| (MessageId(idx as u32), message))
    }

    /// Enums with their ids, in registration order.
    pub fn enums(&self) -> impl Iterator<Item = (EnumId, &EnumDef)> {
        self.enums
            .iter()
            .enumerate()
            .map(|(idx, definition)| (EnumId(idx as u32), definition))
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn enum_count(&self) -> usize {
        self.enums.len()
    }
}

//! JSON schema documents.
//!
//! A document lists messages and enums with qualified names:
//!
//! ```json
//! {
//!   "messages": [
//!     { "name": "demo.Person",
//!       "fields": [
//!         { "number": 1, "name": "id", "type": "int32", "label": "required" },
//!         { "number": 2, "name": "tags", "type": "string", "label": "repeated" },
//!         { "number": 3, "name": "kind", "type": "enum", "type_name": "demo.Kind" }
//!       ] }
//!   ],
//!   "enums": [
//!     { "name": "demo.Kind", "values": [ { "name": "A", "number": 0 } ] }
//!   ]
//! }
//! ```

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::config::LoaderConfig;
use crate::enums::EnumDef;
use crate::error::{DefError, Result};
use crate::field::FieldDescriptor;
use crate::message::MessageDef;
use crate::registry::{Registry, RegistryBuilder};
use crate::types::{Cardinality, ValueType};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDocument {
    #[serde(default)]
    messages: Vec<MessageSpec>,
    #[serde(default)]
    enums: Vec<EnumSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MessageSpec {
    name: String,
    #[serde(default)]
    fields: Vec<FieldSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldSpec {
    number: u32,
    name: String,
    #[serde(rename = "type")]
    value_type: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    type_name: Option<String>,
    #[serde(default)]
    packed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnumSpec {
    name: String,
    #[serde(default)]
    values: Vec<EnumValueSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnumValueSpec {
    name: String,
    number: i32,
}

impl Registry {
    /// Build a registry from a JSON schema document.
    pub fn from_json(document: &str) -> Result<Self> {
        Self::from_json_with_config(document, &LoaderConfig::default())
    }

    /// Build a registry from a JSON schema document with explicit limits.
    pub fn from_json_with_config(document: &str, config: &LoaderConfig) -> Result<Self> {
        let document: SchemaDocument = serde_json::from_str(document)?;
        let count = document.messages.len() + document.enums.len();
        if count > config.max_definitions {
            return Err(DefError::LoadFailed(format!(
                "definition count exceeds configured max ({}): {count}",
                config.max_definitions
            )));
        }
        builder_from_document(document)?.build()
    }

    /// Load a JSON schema document from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_with_config(path, &LoaderConfig::default())
    }

    /// Load a JSON schema document from a file with explicit limits.
    pub fn from_file_with_config(path: &Path, config: &LoaderConfig) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|err| {
            DefError::LoadFailed(format!("failed opening schema {}: {err}", path.display()))
        })?;
        let metadata = file
            .metadata()
            .map_err(|err| DefError::LoadFailed(err.to_string()))?;
        if !metadata.is_file() {
            return Err(DefError::LoadFailed(format!(
                "schema path is not a regular file: {}",
                path.display()
            )));
        }
        if metadata.len() > config.max_schema_file_size as u64 {
            return Err(DefError::LoadFailed(format!(
                "schema file too large ({} bytes): {}",
                metadata.len(),
                path.display()
            )));
        }

        let max_bytes = config.max_schema_file_size;
        let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| {
                DefError::LoadFailed(format!("failed reading schema {}: {err}", path.display()))
            })?;
        if content.len() > max_bytes {
            return Err(DefError::LoadFailed(format!(
                "schema file too large while reading: {}",
                path.display()
            )));
        }

        Self::from_json_with_config(&content, config)
    }
}

fn builder_from_document(document: SchemaDocument) -> Result<RegistryBuilder> {
    let mut builder = RegistryBuilder::new();

    for entry in document.messages {
        let mut message = MessageDef::new(entry.name);
        for field in entry.fields {
            let value_type: ValueType = field.value_type.parse()?;
            let cardinality: Cardinality = match field.label.as_deref() {
                Some(label) => label.parse()?,
                None => Cardinality::default(),
            };
            let mut descriptor = FieldDescriptor::new(field.number, field.name, value_type)
                .with_cardinality(cardinality);
            if field.packed {
                descriptor = descriptor.packed();
            }
            if let Some(type_name) = field.type_name {
                descriptor = descriptor.with_type_name(type_name);
            }
            message.push_field(descriptor);
        }
        builder.add_message(message);
    }

    for entry in document.enums {
        let definition = entry
            .values
            .into_iter()
            .fold(EnumDef::new(entry.name), |def, value| {
                def.with_value(value.name, value.number)
            });
        builder.add_enum(definition);
    }

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const PERSON_SCHEMA: &str = r#"{
        "messages": [
            {
                "name": "demo.Person",
                "fields": [
                    { "number": 1, "name": "id", "type": "int32", "label": "required" },
                    { "number": 2, "name": "scores", "type": "sint32", "label": "repeated", "packed": true },
                    { "number": 3, "name": "kind", "type": "enum", "type_name": "demo.Kind" },
                    { "number": 4, "name": "friend", "type": "message", "type_name": "demo.Person" }
                ]
            }
        ],
        "enums": [
            { "name": "demo.Kind", "values": [ { "name": "HUMAN", "number": 0 }, { "name": "ROBOT", "number": 1 } ] }
        ]
    }"#;

    #[test]
    fn loads_document() {
        let registry = Registry::from_json(PERSON_SCHEMA).unwrap();
        let person = registry
            .message(registry.message_id("demo.Person").unwrap())
            .unwrap();

        let id = person.lookup_field(1).unwrap();
        assert!(id.is_required());
        assert_eq!(id.value_type(), ValueType::Int32);

        let scores = person.lookup_field(2).unwrap();
        assert!(scores.is_repeated());
        assert!(scores.is_packed());

        let kind = registry.enum_id("demo.Kind").unwrap();
        assert_eq!(person.lookup_field(3).unwrap().enum_type(), Some(kind));
        assert_eq!(
            registry.enumeration(kind).unwrap().value_of("ROBOT"),
            Some(1)
        );
    }

    #[test]
    fn rejects_unknown_type_and_label() {
        let bad_type = r#"{"messages":[{"name":"m","fields":[{"number":1,"name":"a","type":"int128"}]}]}"#;
        assert!(matches!(
            Registry::from_json(bad_type),
            Err(DefError::UnknownValueType(_))
        ));

        let bad_label = r#"{"messages":[{"name":"m","fields":[{"number":1,"name":"a","type":"int32","label":"many"}]}]}"#;
        assert!(matches!(
            Registry::from_json(bad_label),
            Err(DefError::UnknownCardinality(_))
        ));
    }

    #[test]
    fn rejects_malformed_json_and_unknown_keys() {
        assert!(matches!(Registry::from_json("{"), Err(DefError::Json(_))));
        assert!(matches!(
            Registry::from_json(r#"{"services":[]}"#),
            Err(DefError::Json(_))
        ));
    }

    #[test]
    fn unresolved_reference_surfaces_from_loader() {
        let doc = r#"{"messages":[{"name":"m","fields":[{"number":1,"name":"a","type":"message","type_name":"nope"}]}]}"#;
        assert!(matches!(
            Registry::from_json(doc),
            Err(DefError::UnresolvedTypeReference { .. })
        ));
    }

    #[test]
    fn definition_count_limit_is_enforced() {
        let config = LoaderConfig {
            max_definitions: 1,
            ..LoaderConfig::default()
        };
        assert!(matches!(
            Registry::from_json_with_config(PERSON_SCHEMA, &config),
            Err(DefError::LoadFailed(_))
        ));
    }

    #[test]
    fn from_file_loads_and_enforces_size() {
        let dir = make_temp_dir("from-file");
        let path = dir.join("person.json");
        std::fs::write(&path, PERSON_SCHEMA).unwrap();

        let registry = Registry::from_file(&path).unwrap();
        assert!(registry.message_id("demo.Person").is_some());

        let config = LoaderConfig {
            max_schema_file_size: 16,
            ..LoaderConfig::default()
        };
        assert!(matches!(
            Registry::from_file_with_config(&path, &config),
            Err(DefError::LoadFailed(_))
        ));

        assert!(matches!(
            Registry::from_file(&dir.join("missing.json")),
            Err(DefError::LoadFailed(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    fn make_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "protostream-def-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}

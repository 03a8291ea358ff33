use std::io::{IsTerminal, Write};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use protostream_codec::{DynamicMessage, FieldValue, Scalar};
use protostream_def::{FieldDescriptor, MessageDef, MessageId, Registry};
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// JSON rendering of a decoded message, keyed by field name.
///
/// Repeated fields become arrays, 64-bit integers strings, bytes base64,
/// and enums their symbolic name when the schema has one. Unknown fields
/// are listed under `"_unknown"`.
pub fn message_to_json(registry: &Registry, id: MessageId, message: &DynamicMessage) -> Value {
    let Some(definition) = registry.message(id) else {
        return Value::Null;
    };
    let mut object = Map::new();
    for field in definition.fields() {
        let values = message.get(field.number());
        if values.is_empty() {
            continue;
        }
        let rendered: Vec<Value> = values
            .iter()
            .map(|value| field_value_to_json(registry, field, value))
            .collect();
        let entry = if field.is_repeated() {
            Value::Array(rendered)
        } else {
            rendered.into_iter().last().unwrap_or(Value::Null)
        };
        object.insert(field.name().to_string(), entry);
    }

    if !message.unknown_fields().is_empty() {
        let unknown: Vec<Value> = message
            .unknown_fields()
            .iter()
            .map(|field| {
                json!({
                    "number": field.field_number(),
                    "tag": BASE64_STANDARD.encode(&field.tag),
                    "payload": BASE64_STANDARD.encode(&field.payload),
                })
            })
            .collect();
        object.insert("_unknown".to_string(), Value::Array(unknown));
    }
    Value::Object(object)
}

fn field_value_to_json(registry: &Registry, field: &FieldDescriptor, value: &FieldValue) -> Value {
    match value {
        FieldValue::Message(nested) => match field.message_type() {
            Some(id) => message_to_json(registry, id, nested),
            None => Value::Null,
        },
        FieldValue::Scalar(scalar) => scalar_to_json(registry, field, scalar),
    }
}

fn scalar_to_json(registry: &Registry, field: &FieldDescriptor, scalar: &Scalar) -> Value {
    match scalar {
        Scalar::I32(v) => json!(v),
        Scalar::U32(v) => json!(v),
        Scalar::I64(v) => Value::String(v.to_string()),
        Scalar::U64(v) => Value::String(v.to_string()),
        Scalar::F32(v) => float_to_json(f64::from(*v)),
        Scalar::F64(v) => float_to_json(*v),
        Scalar::Bool(v) => json!(v),
        Scalar::Enum(v) => enum_name(registry, field, *v)
            .map(|name| Value::String(name.to_string()))
            .unwrap_or_else(|| json!(v)),
        Scalar::String(v) => Value::String(v.clone()),
        Scalar::Bytes(v) => Value::String(BASE64_STANDARD.encode(v)),
    }
}

fn float_to_json(value: f64) -> Value {
    if value.is_nan() {
        Value::String("NaN".to_string())
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        Value::String(text.to_string())
    } else {
        json!(value)
    }
}

fn enum_name<'r>(registry: &'r Registry, field: &FieldDescriptor, value: i32) -> Option<&'r str> {
    field
        .enum_type()
        .and_then(|id| registry.enumeration(id))
        .and_then(|def| def.name_of(value))
}

/// Table of every value in a decoded message, nested fields flattened into
/// dotted paths.
pub fn message_table(registry: &Registry, id: MessageId, message: &DynamicMessage) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "NUMBER", "TYPE", "VALUE"]);
    if let Some(definition) = registry.message(id) {
        add_message_rows(&mut table, registry, definition, message, "");
    }
    table
}

fn add_message_rows(
    table: &mut Table,
    registry: &Registry,
    definition: &MessageDef,
    message: &DynamicMessage,
    prefix: &str,
) {
    for field in definition.fields() {
        let path = format!("{prefix}{}", field.name());
        for (index, value) in message.get(field.number()).iter().enumerate() {
            let path = if field.is_repeated() {
                format!("{path}[{index}]")
            } else {
                path.clone()
            };
            match value {
                FieldValue::Message(nested) => {
                    let nested_def = field.message_type().and_then(|id| registry.message(id));
                    if let Some(nested_def) = nested_def {
                        add_message_rows(table, registry, nested_def, nested, &format!("{path}."));
                    }
                }
                FieldValue::Scalar(scalar) => {
                    let rendered = match scalar_to_json(registry, field, scalar) {
                        Value::String(text) => text,
                        other => other.to_string(),
                    };
                    table.add_row(vec![
                        path,
                        field.number().to_string(),
                        field.value_type().to_string(),
                        rendered,
                    ]);
                }
            }
        }
    }
    for unknown in message.unknown_fields() {
        table.add_row(vec![
            format!("{prefix}?"),
            unknown
                .field_number()
                .map_or_else(|| "?".to_string(), |n| n.to_string()),
            "unknown".to_string(),
            format!("<{} bytes>", unknown.payload.len()),
        ]);
    }
}

#[derive(Serialize)]
pub struct FieldOutput<'a> {
    pub number: u32,
    pub name: &'a str,
    #[serde(rename = "type")]
    pub value_type: &'static str,
    pub label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub packed: bool,
}

#[derive(Serialize)]
pub struct MessageOutput<'a> {
    pub name: &'a str,
    pub fields: Vec<FieldOutput<'a>>,
}

#[derive(Serialize)]
pub struct EnumValueOutput<'a> {
    pub name: &'a str,
    pub number: i32,
}

#[derive(Serialize)]
pub struct EnumOutput<'a> {
    pub name: &'a str,
    pub values: Vec<EnumValueOutput<'a>>,
}

#[derive(Serialize)]
pub struct SchemaOutput<'a> {
    pub schema_id: &'static str,
    pub messages: Vec<MessageOutput<'a>>,
    pub enums: Vec<EnumOutput<'a>>,
}

impl<'a> MessageOutput<'a> {
    pub fn from_def(definition: &'a MessageDef) -> Self {
        Self {
            name: definition.name(),
            fields: definition
                .fields()
                .iter()
                .map(|field| FieldOutput {
                    number: field.number(),
                    name: field.name(),
                    value_type: field.value_type().as_str(),
                    label: field.cardinality().as_str(),
                    type_name: field.type_name(),
                    packed: field.is_packed(),
                })
                .collect(),
        }
    }
}

pub fn print_schema(schema: &SchemaOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(schema),
        OutputFormat::Table => {
            for message in &schema.messages {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["NUMBER", "NAME", "TYPE", "LABEL", "TYPE NAME"]);
                for field in &message.fields {
                    let value_type = if field.packed {
                        format!("{} (packed)", field.value_type)
                    } else {
                        field.value_type.to_string()
                    };
                    table.add_row(vec![
                        field.number.to_string(),
                        field.name.to_string(),
                        value_type,
                        field.label.to_string(),
                        field.type_name.unwrap_or("").to_string(),
                    ]);
                }
                println!("message {}", message.name);
                println!("{table}");
            }
            for definition in &schema.enums {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["NUMBER", "NAME"]);
                for value in &definition.values {
                    table.add_row(vec![value.number.to_string(), value.name.to_string()]);
                }
                println!("enum {}", definition.name);
                println!("{table}");
            }
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for message in &schema.messages {
                println!("message {} {{", message.name);
                for field in &message.fields {
                    let value_type = field.type_name.unwrap_or(field.value_type);
                    let packed = if field.packed { " [packed = true]" } else { "" };
                    println!(
                        "  {} {} {} = {}{packed};",
                        field.label, value_type, field.name, field.number
                    );
                }
                println!("}}");
            }
            for definition in &schema.enums {
                println!("enum {} {{", definition.name);
                for value in &definition.values {
                    println!("  {} = {};", value.name, value.number);
                }
                println!("}}");
            }
        }
    }
}

#[derive(Serialize)]
pub struct ReencodeOutput<'a> {
    pub schema_id: &'static str,
    pub message: &'a str,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub identical: bool,
    pub output: String,
}

pub fn print_reencode(report: &ReencodeOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MESSAGE", "INPUT BYTES", "OUTPUT BYTES", "IDENTICAL", "OUTPUT"])
                .add_row(vec![
                    report.message.to_string(),
                    report.input_bytes.to_string(),
                    report.output_bytes.to_string(),
                    report.identical.to_string(),
                    report.output.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!(
                "message={} input={} output={} identical={} -> {}",
                report.message,
                report.input_bytes,
                report.output_bytes,
                report.identical,
                report.output
            );
        }
    }
}

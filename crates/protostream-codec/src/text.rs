//! Human-readable rendering of decoded messages.
//!
//! Output follows the protobuf text format closely enough to read and diff,
//! without aiming to be parsed back:
//!
//! ```text
//! id: 150
//! name: "Bob"
//! address {
//!   city: "Paris"
//! }
//! 99: "\001"
//! ```
//!
//! Unknown fields print as their field number and raw payload bytes.

use std::fmt::Write as _;

use bytes::Bytes;
use protostream_def::{FieldDescriptor, Registry};
use protostream_wire::{ByteSink, WireError};

use crate::handler::{Flow, Handler};
use crate::value::{Scalar, UnknownField};

/// Handler that prints each event as a line of text.
#[derive(Debug)]
pub struct TextPrinter<'r, K> {
    registry: &'r Registry,
    sink: K,
    single_line: bool,
    indent: usize,
    started: bool,
    line: String,
    error: Option<WireError>,
}

impl<'r, K: ByteSink> TextPrinter<'r, K> {
    pub fn new(registry: &'r Registry, sink: K) -> Self {
        Self {
            registry,
            sink,
            single_line: false,
            indent: 0,
            started: false,
            line: String::new(),
            error: None,
        }
    }

    /// Print everything on one line, fields separated by spaces.
    pub fn single_line(mut self, single_line: bool) -> Self {
        self.single_line = single_line;
        self
    }

    /// Flush and return the sink, or the first write error.
    pub fn finish(mut self) -> Result<K, WireError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if self.single_line && self.started {
            self.sink.write_bytes(b"\n")?;
        }
        Ok(self.sink)
    }

    fn emit(&mut self, render: impl FnOnce(&mut String)) -> Flow {
        if self.error.is_some() {
            return Flow::Break;
        }
        self.line.clear();
        if self.single_line {
            if self.started {
                self.line.push(' ');
            }
        } else {
            for _ in 0..self.indent {
                self.line.push_str("  ");
            }
        }
        render(&mut self.line);
        if !self.single_line {
            self.line.push('\n');
        }
        self.started = true;

        match self.sink.write_bytes(self.line.as_bytes()) {
            Ok(()) => Flow::Continue,
            Err(err) => {
                self.error = Some(err);
                Flow::Break
            }
        }
    }

    fn render_scalar(&self, field: &FieldDescriptor, value: &Scalar, out: &mut String) {
        match value {
            Scalar::Enum(number) => {
                let name = field
                    .enum_type()
                    .and_then(|id| self.registry.enumeration(id))
                    .and_then(|def| def.name_of(*number));
                match name {
                    Some(name) => out.push_str(name),
                    None => push_display(out, number),
                }
            }
            Scalar::F32(v) => push_float(out, f64::from(*v), &v.to_string()),
            Scalar::F64(v) => push_float(out, *v, &v.to_string()),
            Scalar::String(v) => push_quoted(out, v.as_bytes()),
            Scalar::Bytes(v) => push_quoted(out, v),
            other => push_display(out, other),
        }
    }
}

impl<K: ByteSink> Handler for TextPrinter<'_, K> {
    fn on_scalar_field(&mut self, field: &FieldDescriptor, value: Scalar) -> Flow {
        let mut rendered = String::new();
        self.render_scalar(field, &value, &mut rendered);
        self.emit(|line| {
            line.push_str(field.name());
            line.push_str(": ");
            line.push_str(&rendered);
        })
    }

    fn on_start_submessage(&mut self, field: &FieldDescriptor) -> Flow {
        let flow = self.emit(|line| {
            line.push_str(field.name());
            line.push_str(" {");
        });
        self.indent += 1;
        flow
    }

    fn on_end_submessage(&mut self) -> Flow {
        self.indent = self.indent.saturating_sub(1);
        self.emit(|line| line.push('}'))
    }

    fn on_unknown_field(&mut self, tag: &[u8], payload: Bytes) -> Flow {
        let field = UnknownField::new(Bytes::copy_from_slice(tag), payload);
        self.emit(|line| {
            match field.field_number() {
                Some(number) => push_display(line, number),
                None => line.push('?'),
            }
            line.push_str(": ");
            push_quoted(line, &field.payload);
        })
    }
}

fn push_display(out: &mut String, value: impl std::fmt::Display) {
    let _ = write!(out, "{value}");
}

fn push_float(out: &mut String, value: f64, shortest: &str) {
    if value.is_nan() {
        out.push_str("nan");
    } else if value.is_infinite() {
        out.push_str(if value > 0.0 { "inf" } else { "-inf" });
    } else {
        out.push_str(shortest);
    }
}

/// Double-quoted with C escapes; bytes outside printable ASCII as octal.
fn push_quoted(out: &mut String, bytes: &[u8]) {
    out.push('"');
    for &byte in bytes {
        match byte {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b'"' => out.push_str("\\\""),
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\{byte:03o}");
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use protostream_def::{EnumDef, MessageDef, ValueType};
    use protostream_wire::SliceSource;

    use super::*;
    use crate::decoder::Decoder;

    fn registry() -> Registry {
        Registry::builder()
            .message(
                MessageDef::new("test.Person")
                    .with_field(FieldDescriptor::new(1, "id", ValueType::Int32))
                    .with_field(FieldDescriptor::new(2, "name", ValueType::String))
                    .with_field(
                        FieldDescriptor::new(3, "address", ValueType::Message)
                            .with_type_name("test.Address"),
                    )
                    .with_field(
                        FieldDescriptor::new(4, "kind", ValueType::Enum)
                            .with_type_name("test.Kind"),
                    )
                    .with_field(FieldDescriptor::new(5, "ratio", ValueType::Float)),
            )
            .message(
                MessageDef::new("test.Address")
                    .with_field(FieldDescriptor::new(1, "city", ValueType::String)),
            )
            .enumeration(EnumDef::new("test.Kind").with_value("ROBOT", 1))
            .build()
            .unwrap()
    }

    fn print(input: &'static [u8], single_line: bool) -> String {
        let registry = registry();
        let id = registry.message_id("test.Person").unwrap();
        let mut printer = TextPrinter::new(&registry, Vec::new()).single_line(single_line);
        Decoder::new(&registry)
            .decode(id, SliceSource::from(input), &mut printer)
            .unwrap();
        String::from_utf8(printer.finish().unwrap()).unwrap()
    }

    const INPUT: &[u8] =
        b"\x08\x96\x01\x12\x05B\"o\nb\x1a\x07\x0a\x05Paris\x20\x01\x20\x07\x2d\x00\x00\xc0\x3f\x98\x06\x01";

    #[test]
    fn multi_line_output() {
        assert_eq!(
            print(INPUT, false),
            "id: 150\n\
             name: \"B\\\"o\\nb\"\n\
             address {\n\
             \x20 city: \"Paris\"\n\
             }\n\
             kind: ROBOT\n\
             kind: 7\n\
             ratio: 1.5\n\
             99: \"\\001\"\n"
        );
    }

    #[test]
    fn single_line_output() {
        assert_eq!(
            print(INPUT, true),
            "id: 150 name: \"B\\\"o\\nb\" address { city: \"Paris\" } kind: ROBOT kind: 7 ratio: 1.5 99: \"\\001\"\n"
        );
    }

    #[test]
    fn empty_message_prints_nothing() {
        assert_eq!(print(b"", false), "");
        assert_eq!(print(b"", true), "");
    }

    #[test]
    fn escapes_non_printable_bytes() {
        let mut out = String::new();
        push_quoted(&mut out, b"a\x00\xff\t'");
        assert_eq!(out, "\"a\\000\\377\\t\\'\"");
    }

    #[test]
    fn special_floats() {
        let mut out = String::new();
        push_float(&mut out, f64::NAN, "NaN");
        out.push(' ');
        push_float(&mut out, f64::NEG_INFINITY, "-inf");
        assert_eq!(out, "nan -inf");
    }
}

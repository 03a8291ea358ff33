use bytes::Bytes;
use protostream_def::{FieldDescriptor, MessageDef, MessageId, Registry};
use tracing::debug;

use crate::config::EncodeConfig;
use crate::encoder::Encoder;
use crate::error::{EncodeError, EncodeResult};
use crate::handler::{Flow, Handler};
use crate::message::{DynamicMessage, MessageStack};
use crate::value::{FieldValue, Scalar, UnknownField};

/// Encoder fed one field at a time.
///
/// Values are pushed by field number with submessages bracketed by
/// [`StreamEncoder::start_submessage`] / [`StreamEncoder::end_submessage`],
/// in any order. Field numbers and nesting are checked as they arrive; value
/// types, cardinality and required fields are checked by
/// [`StreamEncoder::finish`], which writes the message in declared order.
///
/// The encoder is also a [`Handler`], so a decode can feed it directly. On
/// the first error it stops the decode and reports the error from `finish`.
#[derive(Debug)]
pub struct StreamEncoder<'r> {
    encoder: Encoder<'r>,
    root_id: MessageId,
    root: &'r MessageDef,
    open: Vec<&'r MessageDef>,
    stack: MessageStack,
    error: Option<EncodeError>,
}

impl<'r> StreamEncoder<'r> {
    pub fn new(registry: &'r Registry, root: MessageId) -> EncodeResult<Self> {
        Self::with_config(registry, root, EncodeConfig::default())
    }

    pub fn with_config(
        registry: &'r Registry,
        root: MessageId,
        config: EncodeConfig,
    ) -> EncodeResult<Self> {
        let definition = registry
            .message(root)
            .ok_or(EncodeError::UnknownMessage(root))?;
        Ok(Self {
            encoder: Encoder::with_config(registry, config),
            root_id: root,
            root: definition,
            open: Vec::new(),
            stack: MessageStack::default(),
            error: None,
        })
    }

    fn current(&self) -> &'r MessageDef {
        self.open.last().copied().unwrap_or(self.root)
    }

    fn field(&self, number: u32) -> EncodeResult<&'r FieldDescriptor> {
        let message = self.current();
        message
            .lookup_field(number)
            .ok_or_else(|| EncodeError::UnknownField {
                message: message.name().to_owned(),
                number,
            })
    }

    /// Supply a scalar. A singular field keeps the last value supplied.
    pub fn write_scalar(&mut self, number: u32, value: impl Into<Scalar>) -> EncodeResult<()> {
        let field = self.field(number)?;
        if field.value_type().is_submessage() {
            return Err(EncodeError::ValueTypeMismatch {
                field: field.name().to_owned(),
                expected: field.value_type(),
            });
        }
        self.stack.store(
            number,
            field.is_repeated(),
            FieldValue::Scalar(value.into()),
        );
        Ok(())
    }

    /// Open a submessage or group field. Following calls address its fields
    /// until the matching [`StreamEncoder::end_submessage`].
    pub fn start_submessage(&mut self, number: u32) -> EncodeResult<()> {
        let field = self.field(number)?;
        let mismatch = || EncodeError::ValueTypeMismatch {
            field: field.name().to_owned(),
            expected: field.value_type(),
        };
        if !field.value_type().is_submessage() {
            return Err(mismatch());
        }
        let nested = field.message_type().ok_or_else(mismatch)?;
        let max_depth = self.encoder.config().max_depth;
        if self.stack.depth() >= max_depth {
            return Err(EncodeError::NestingTooDeep { limit: max_depth });
        }
        let definition = self
            .encoder
            .registry()
            .message(nested)
            .ok_or(EncodeError::UnknownMessage(nested))?;
        self.open.push(definition);
        self.stack.open(number, field.is_repeated());
        Ok(())
    }

    pub fn end_submessage(&mut self) -> EncodeResult<()> {
        if self.open.pop().is_none() {
            return Err(EncodeError::UnbalancedSubmessage);
        }
        self.stack.close();
        Ok(())
    }

    /// Supply an unknown field, written back verbatim after the known fields
    /// of the message it belongs to.
    pub fn write_unknown(&mut self, tag: impl Into<Bytes>, payload: impl Into<Bytes>) {
        self.stack
            .current()
            .push_unknown(UnknownField::new(tag, payload));
    }

    /// The message assembled so far, once every submessage is closed.
    pub fn into_message(self) -> EncodeResult<DynamicMessage> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !self.open.is_empty() {
            return Err(EncodeError::UnbalancedSubmessage);
        }
        Ok(self.stack.into_root())
    }

    /// Validate and serialize the message into `sink`.
    pub fn finish<K: protostream_wire::ByteSink>(self, sink: K) -> EncodeResult<()> {
        let encoder = self.encoder.clone();
        let root = self.root_id;
        let message = self.into_message()?;
        encoder.encode(root, &message, sink)
    }

    fn record(&mut self, result: EncodeResult<()>) -> Flow {
        match result {
            Ok(()) => Flow::Continue,
            Err(err) => {
                debug!(error = %err, "stream encoder rejected input");
                self.error = Some(err);
                Flow::Break
            }
        }
    }
}

impl Handler for StreamEncoder<'_> {
    fn on_scalar_field(&mut self, field: &FieldDescriptor, value: Scalar) -> Flow {
        let result = self.write_scalar(field.number(), value);
        self.record(result)
    }

    fn on_start_submessage(&mut self, field: &FieldDescriptor) -> Flow {
        let result = self.start_submessage(field.number());
        self.record(result)
    }

    fn on_end_submessage(&mut self) -> Flow {
        let result = self.end_submessage();
        self.record(result)
    }

    fn on_unknown_field(&mut self, tag: &[u8], payload: Bytes) -> Flow {
        self.write_unknown(Bytes::copy_from_slice(tag), payload);
        Flow::Continue
    }
}

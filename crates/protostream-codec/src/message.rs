//! In-memory message trees.

use std::collections::BTreeMap;

use bytes::Bytes;
use protostream_def::{FieldDescriptor, MessageId, Registry};
use protostream_wire::{ByteSource, SliceSource};

use crate::config::{DecodeConfig, EncodeConfig};
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{DecodeResult, EncodeResult};
use crate::handler::{Flow, Handler};
use crate::value::{FieldValue, Scalar, UnknownField};

/// A message held as field values keyed by field number.
///
/// Values for one number keep their insertion order. Nothing here checks the
/// values against a schema; the encoder does that when the message is
/// serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicMessage {
    fields: BTreeMap<u32, Vec<FieldValue>>,
    unknown: Vec<UnknownField>,
}

impl DynamicMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `number`.
    pub fn push(&mut self, number: u32, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.entry(number).or_default().push(value.into());
        self
    }

    /// Replace every value for `number` with `value`.
    pub fn set(&mut self, number: u32, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.insert(number, vec![value.into()]);
        self
    }

    /// Builder form of [`DynamicMessage::push`].
    pub fn with(mut self, number: u32, value: impl Into<FieldValue>) -> Self {
        self.push(number, value);
        self
    }

    /// Values for `number`, empty if none.
    pub fn get(&self, number: u32) -> &[FieldValue] {
        self.fields.get(&number).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Last value for `number`.
    pub fn last(&self, number: u32) -> Option<&FieldValue> {
        self.get(number).last()
    }

    pub fn scalar(&self, number: u32) -> Option<&Scalar> {
        self.last(number).and_then(FieldValue::as_scalar)
    }

    pub fn message(&self, number: u32) -> Option<&DynamicMessage> {
        self.last(number).and_then(FieldValue::as_message)
    }

    pub fn remove(&mut self, number: u32) -> Vec<FieldValue> {
        self.fields.remove(&number).unwrap_or_default()
    }

    /// Field numbers holding at least one value, ascending.
    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.fields.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[FieldValue])> {
        self.fields
            .iter()
            .map(|(number, values)| (*number, values.as_slice()))
    }

    pub fn unknown_fields(&self) -> &[UnknownField] {
        &self.unknown
    }

    pub fn push_unknown(&mut self, field: UnknownField) -> &mut Self {
        self.unknown.push(field);
        self
    }

    pub fn clear_unknown(&mut self) {
        self.unknown.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.unknown.is_empty()
    }

    /// Decode a complete buffer as message `id`.
    pub fn decode(registry: &Registry, id: MessageId, buf: impl Into<Bytes>) -> DecodeResult<Self> {
        Self::decode_from(registry, id, SliceSource::new(buf), DecodeConfig::default())
    }

    /// Decode message `id` from any byte source.
    pub fn decode_from<S: ByteSource>(
        registry: &Registry,
        id: MessageId,
        mut src: S,
        config: DecodeConfig,
    ) -> DecodeResult<Self> {
        let mut builder = TreeBuilder::new();
        Decoder::with_config(registry, config).decode(id, &mut src, &mut builder)?;
        Ok(builder.finish())
    }

    /// Serialize as message `id`.
    pub fn encode_to_vec(&self, registry: &Registry, id: MessageId) -> EncodeResult<Vec<u8>> {
        Encoder::with_config(registry, EncodeConfig::default()).encode_to_vec(id, self)
    }
}

#[derive(Debug)]
struct Open {
    number: u32,
    repeated: bool,
    message: DynamicMessage,
}

/// Stack of partially built messages, shared by the tree builder and the
/// streaming encoder.
#[derive(Debug, Default)]
pub(crate) struct MessageStack {
    root: DynamicMessage,
    open: Vec<Open>,
}

impl MessageStack {
    pub(crate) fn current(&mut self) -> &mut DynamicMessage {
        match self.open.last_mut() {
            Some(open) => &mut open.message,
            None => &mut self.root,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.open.len()
    }

    /// Record a value. Singular fields keep only the last value seen.
    pub(crate) fn store(&mut self, number: u32, repeated: bool, value: FieldValue) {
        let current = self.current();
        if repeated {
            current.push(number, value);
        } else {
            current.set(number, value);
        }
    }

    pub(crate) fn open(&mut self, number: u32, repeated: bool) {
        self.open.push(Open {
            number,
            repeated,
            message: DynamicMessage::new(),
        });
    }

    /// Close the innermost submessage. Returns `false` if none is open.
    pub(crate) fn close(&mut self) -> bool {
        let Some(open) = self.open.pop() else {
            return false;
        };
        self.store(open.number, open.repeated, FieldValue::Message(open.message));
        true
    }

    /// The root message, closing anything still open.
    pub(crate) fn into_root(mut self) -> DynamicMessage {
        while self.close() {}
        self.root
    }
}

/// Handler that assembles decoder events into a [`DynamicMessage`].
///
/// A singular field that occurs more than once keeps its last value,
/// submessages included.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    stack: MessageStack,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The assembled message. Submessages left open by an interrupted
    /// decode are attached as they stand.
    pub fn finish(self) -> DynamicMessage {
        self.stack.into_root()
    }
}

impl Handler for TreeBuilder {
    fn on_scalar_field(&mut self, field: &FieldDescriptor, value: Scalar) -> Flow {
        self.stack
            .store(field.number(), field.is_repeated(), FieldValue::Scalar(value));
        Flow::Continue
    }

    fn on_start_submessage(&mut self, field: &FieldDescriptor) -> Flow {
        self.stack.open(field.number(), field.is_repeated());
        Flow::Continue
    }

    fn on_end_submessage(&mut self) -> Flow {
        self.stack.close();
        Flow::Continue
    }

    fn on_unknown_field(&mut self, tag: &[u8], payload: Bytes) -> Flow {
        self.stack
            .current()
            .push_unknown(UnknownField::new(Bytes::copy_from_slice(tag), payload));
        Flow::Continue
    }
}

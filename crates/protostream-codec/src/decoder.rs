//! Streaming, schema-driven decoder.
//!
//! The decoder walks the input once, front to back, and reports each field to
//! a [`Handler`] as soon as it is read. Nesting is tracked on an explicit
//! frame stack rather than the call stack, so hostile inputs are bounded by
//! [`DecodeConfig::max_depth`] and cannot overflow the thread's stack.
//!
//! Nothing is buffered beyond the field being read: strings and bytes are
//! handed over whole, submessages are not.

use bytes::{BufMut, Bytes, BytesMut};
use protostream_def::{FieldDescriptor, MessageDef, MessageId, Registry, ValueType};
use protostream_wire::{
    check_length, read_fixed32, read_fixed64, read_length, read_raw_varint, read_tag,
    read_varint, zigzag_decode32, zigzag_decode64, ByteSource, RawVarint, SliceSource, Tag,
    WireType,
};
use tracing::{debug, trace};

use crate::config::{DecodeConfig, UnknownFieldPolicy};
use crate::error::{DecodeError, DecodeResult};
use crate::handler::{Flow, Handler};
use crate::value::Scalar;

/// An open submessage or group.
struct Frame<'r> {
    message: &'r MessageDef,
    /// Absolute input position where the enclosing length-delimited region
    /// ends. Groups inherit their parent's.
    limit: Option<u64>,
    /// Field number of an open group, closed by its end-group tag.
    group: Option<u32>,
}

/// Decoder bound to a registry.
///
/// Cheap to construct and to copy around; it holds only a registry borrow
/// and its configuration.
#[derive(Debug, Clone)]
pub struct Decoder<'r> {
    registry: &'r Registry,
    config: DecodeConfig,
}

impl<'r> Decoder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_config(registry, DecodeConfig::default())
    }

    pub fn with_config(registry: &'r Registry, config: DecodeConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Decode one message of type `id` from `src`, reporting to `handler`.
    ///
    /// Reads until the source is exhausted. Returns `Ok(())` early if the
    /// handler answers [`Flow::Break`]. On error the handler has seen every
    /// field before the failure and nothing after it.
    pub fn decode<S, H>(&self, id: MessageId, mut src: S, mut handler: H) -> DecodeResult<()>
    where
        S: ByteSource,
        H: Handler,
    {
        let root = self
            .registry
            .message(id)
            .ok_or(DecodeError::UnknownMessage(id))?;
        trace!(message_type = root.name(), "decode started");

        let mut stack: Vec<Frame<'r>> = Vec::new();
        loop {
            let limit = stack.last().and_then(|frame| frame.limit);

            if let Some(limit) = limit {
                if src.position() >= limit {
                    let closes_group = stack.last().is_some_and(|frame| frame.group.is_some());
                    if closes_group {
                        // The enclosing message ended with a group still open.
                        return Err(DecodeError::TruncatedInput {
                            needed: 1,
                            available: 0,
                        });
                    }
                    stack.pop();
                    if handler.on_end_submessage() == Flow::Break {
                        return stopped();
                    }
                    continue;
                }
            }

            let tag_start = src.position();
            let Some((tag, raw)) = read_tag(&mut src)? else {
                if stack.is_empty() {
                    trace!(message_type = root.name(), bytes = src.position(), "decode finished");
                    return Ok(());
                }
                return Err(DecodeError::TruncatedInput {
                    needed: 1,
                    available: 0,
                });
            };
            within(&src, limit, tag_start)?;

            if tag.wire_type == WireType::EndGroup {
                match stack.last() {
                    Some(Frame {
                        group: Some(number),
                        ..
                    }) if *number == tag.field_number => {
                        stack.pop();
                        if handler.on_end_submessage() == Flow::Break {
                            return stopped();
                        }
                        continue;
                    }
                    _ => return Err(DecodeError::InvalidTag(tag.raw())),
                }
            }

            let message = stack.last().map_or(root, |frame| frame.message);
            let Some(field) = message.lookup_field(tag.field_number) else {
                let flow = self.unknown_field(tag, &raw, &mut src, limit, stack.len(), &mut handler)?;
                if flow == Flow::Break {
                    return stopped();
                }
                continue;
            };

            if !field.accepts(tag.wire_type) {
                return Err(DecodeError::WireTypeMismatch {
                    field: field.number(),
                    expected: field.wire_type(),
                    actual: tag.wire_type,
                });
            }

            let flow = match field.value_type() {
                ValueType::Message => {
                    let len = bounded_length(&mut src, limit)?;
                    let nested = self.nested(field)?;
                    self.check_depth(stack.len())?;
                    match handler.on_start_submessage(field) {
                        Flow::Continue => {
                            stack.push(Frame {
                                message: nested,
                                limit: Some(src.position() + len as u64),
                                group: None,
                            });
                            Flow::Continue
                        }
                        Flow::SkipSubmessage => {
                            src.skip(len)?;
                            Flow::Continue
                        }
                        Flow::Break => Flow::Break,
                    }
                }
                ValueType::Group => {
                    let nested = self.nested(field)?;
                    self.check_depth(stack.len())?;
                    match handler.on_start_submessage(field) {
                        Flow::Continue => {
                            stack.push(Frame {
                                message: nested,
                                limit,
                                group: Some(tag.field_number),
                            });
                            Flow::Continue
                        }
                        Flow::SkipSubmessage => {
                            let start = src.position();
                            consume_unknown(tag, &mut src, limit, stack.len(), self.config.max_depth, None)?;
                            within(&src, limit, start)?;
                            Flow::Continue
                        }
                        Flow::Break => Flow::Break,
                    }
                }
                value_type
                    if tag.wire_type == WireType::LengthDelimited && value_type.is_packable() =>
                {
                    packed_run(field, &mut src, limit, &mut handler)?
                }
                _ => {
                    let start = src.position();
                    let value = read_scalar(field, tag.wire_type, &mut src, limit)?;
                    within(&src, limit, start)?;
                    handler.on_scalar_field(field, value)
                }
            };

            if flow == Flow::Break {
                return stopped();
            }
        }
    }

    fn nested(&self, field: &FieldDescriptor) -> DecodeResult<&'r MessageDef> {
        let id = field
            .message_type()
            .ok_or(DecodeError::UnresolvedField(field.number()))?;
        self.registry
            .message(id)
            .ok_or(DecodeError::UnknownMessage(id))
    }

    fn check_depth(&self, open: usize) -> DecodeResult<()> {
        if open >= self.config.max_depth {
            return Err(DecodeError::NestingTooDeep {
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }

    fn unknown_field<S, H>(
        &self,
        tag: Tag,
        raw: &RawVarint,
        src: &mut S,
        limit: Option<u64>,
        depth: usize,
        handler: &mut H,
    ) -> DecodeResult<Flow>
    where
        S: ByteSource,
        H: Handler,
    {
        let start = src.position();
        match self.config.unknown_fields {
            UnknownFieldPolicy::Preserve => {
                let mut payload = BytesMut::new();
                consume_unknown(tag, src, limit, depth, self.config.max_depth, Some(&mut payload))?;
                within(&*src, limit, start)?;
                trace!(
                    field = tag.field_number,
                    wire_type = %tag.wire_type,
                    len = payload.len(),
                    "unknown field"
                );
                Ok(handler.on_unknown_field(raw.as_bytes(), payload.freeze()))
            }
            UnknownFieldPolicy::Skip => {
                consume_unknown(tag, src, limit, depth, self.config.max_depth, None)?;
                within(&*src, limit, start)?;
                Ok(Flow::Continue)
            }
        }
    }
}

/// Decode one message of type `id` with the default configuration.
pub fn decode<S, H>(registry: &Registry, id: MessageId, src: S, handler: H) -> DecodeResult<()>
where
    S: ByteSource,
    H: Handler,
{
    Decoder::new(registry).decode(id, src, handler)
}

fn stopped() -> DecodeResult<()> {
    debug!("decode stopped by handler");
    Ok(())
}

/// Fail if the read that began at `start` ran past `limit`.
fn within<S: ByteSource>(src: &S, limit: Option<u64>, start: u64) -> DecodeResult<()> {
    match limit {
        Some(limit) if src.position() > limit => Err(DecodeError::TruncatedInput {
            needed: (src.position() - start) as usize,
            available: limit.saturating_sub(start) as usize,
        }),
        _ => Ok(()),
    }
}

/// Fail, consuming nothing further, unless `len` more bytes fit both the
/// input and the enclosing region.
fn ensure_available<S: ByteSource>(src: &S, limit: Option<u64>, len: usize) -> DecodeResult<()> {
    if let Some(available) = src.remaining() {
        if len > available {
            return Err(DecodeError::TruncatedInput {
                needed: len,
                available,
            });
        }
    }
    if let Some(limit) = limit {
        let position = src.position();
        let available = limit.saturating_sub(position);
        if position > limit || len as u64 > available {
            return Err(DecodeError::TruncatedInput {
                needed: len,
                available: available as usize,
            });
        }
    }
    Ok(())
}

fn bounded_length<S: ByteSource>(src: &mut S, limit: Option<u64>) -> DecodeResult<usize> {
    let len = read_length(src)?;
    ensure_available(&*src, limit, len)?;
    Ok(len)
}

fn packed_run<S, H>(
    field: &FieldDescriptor,
    src: &mut S,
    limit: Option<u64>,
    handler: &mut H,
) -> DecodeResult<Flow>
where
    S: ByteSource,
    H: Handler,
{
    let len = bounded_length(src, limit)?;
    let mut run = SliceSource::new(src.read_bytes(len)?);
    let wire_type = field.wire_type();
    while !run.is_empty() {
        let value = read_scalar(field, wire_type, &mut run, None)?;
        if handler.on_scalar_field(field, value) == Flow::Break {
            return Ok(Flow::Break);
        }
    }
    Ok(Flow::Continue)
}

fn read_scalar<S: ByteSource>(
    field: &FieldDescriptor,
    wire_type: WireType,
    src: &mut S,
    limit: Option<u64>,
) -> DecodeResult<Scalar> {
    let value = match field.value_type() {
        ValueType::Int32 => Scalar::I32(read_varint(src)? as i32),
        ValueType::Int64 => Scalar::I64(read_varint(src)? as i64),
        ValueType::Uint32 => Scalar::U32(read_varint(src)? as u32),
        ValueType::Uint64 => Scalar::U64(read_varint(src)?),
        ValueType::Sint32 => Scalar::I32(zigzag_decode32(read_varint(src)? as u32)),
        ValueType::Sint64 => Scalar::I64(zigzag_decode64(read_varint(src)?)),
        ValueType::Bool => Scalar::Bool(read_varint(src)? != 0),
        ValueType::Enum => Scalar::Enum(read_varint(src)? as i32),
        ValueType::Fixed32 => Scalar::U32(read_fixed32(src)?),
        ValueType::Sfixed32 => Scalar::I32(read_fixed32(src)? as i32),
        ValueType::Float => Scalar::F32(f32::from_bits(read_fixed32(src)?)),
        ValueType::Fixed64 => Scalar::U64(read_fixed64(src)?),
        ValueType::Sfixed64 => Scalar::I64(read_fixed64(src)? as i64),
        ValueType::Double => Scalar::F64(f64::from_bits(read_fixed64(src)?)),
        ValueType::String => {
            let len = bounded_length(src, limit)?;
            let bytes = src.read_bytes(len)?;
            let text = std::str::from_utf8(&bytes).map_err(|_| DecodeError::InvalidUtf8 {
                field: field.number(),
            })?;
            Scalar::String(text.to_owned())
        }
        ValueType::Bytes => {
            let len = bounded_length(src, limit)?;
            Scalar::Bytes(src.read_bytes(len)?)
        }
        ValueType::Message | ValueType::Group => {
            return Err(DecodeError::WireTypeMismatch {
                field: field.number(),
                expected: field.wire_type(),
                actual: wire_type,
            })
        }
    };
    Ok(value)
}

/// Consume the payload of a field the decoder does not interpret, copying
/// the raw bytes into `out` when given.
///
/// Groups are scanned to their matching end-group tag, nested groups
/// included; the copied payload ends with that tag.
fn consume_unknown<S: ByteSource>(
    tag: Tag,
    src: &mut S,
    limit: Option<u64>,
    depth: usize,
    max_depth: usize,
    mut out: Option<&mut BytesMut>,
) -> DecodeResult<()> {
    match tag.wire_type {
        WireType::Varint => {
            let raw = read_raw_varint(src)?.ok_or(DecodeError::TruncatedInput {
                needed: 1,
                available: 0,
            })?;
            if let Some(out) = out {
                out.put_slice(raw.as_bytes());
            }
        }
        WireType::Fixed32 => take(src, 4, out)?,
        WireType::Fixed64 => take(src, 8, out)?,
        WireType::LengthDelimited => {
            let raw = read_raw_varint(src)?.ok_or(DecodeError::TruncatedInput {
                needed: 1,
                available: 0,
            })?;
            let len = check_length(raw.value)?;
            ensure_available(&*src, limit, len)?;
            if let Some(out) = out.as_deref_mut() {
                out.put_slice(raw.as_bytes());
            }
            take(src, len, out)?;
        }
        WireType::StartGroup => {
            let mut open = vec![tag.field_number];
            while let Some(&number) = open.last() {
                if depth + open.len() > max_depth {
                    return Err(DecodeError::NestingTooDeep { limit: max_depth });
                }
                let (inner, raw) = read_tag(src)?.ok_or(DecodeError::TruncatedInput {
                    needed: 1,
                    available: 0,
                })?;
                if let Some(out) = out.as_deref_mut() {
                    out.put_slice(raw.as_bytes());
                }
                match inner.wire_type {
                    WireType::EndGroup if inner.field_number == number => {
                        open.pop();
                    }
                    WireType::EndGroup => return Err(DecodeError::InvalidTag(inner.raw())),
                    WireType::StartGroup => open.push(inner.field_number),
                    _ => consume_unknown(inner, src, limit, depth, max_depth, out.as_deref_mut())?,
                }
            }
        }
        WireType::EndGroup => return Err(DecodeError::InvalidTag(tag.raw())),
    }
    Ok(())
}

fn take<S: ByteSource>(src: &mut S, len: usize, out: Option<&mut BytesMut>) -> DecodeResult<()> {
    match out {
        Some(out) => {
            let bytes: Bytes = src.read_bytes(len)?;
            out.put_slice(&bytes);
        }
        None => src.skip(len)?,
    }
    Ok(())
}

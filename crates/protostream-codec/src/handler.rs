use bytes::Bytes;
use protostream_def::FieldDescriptor;

use crate::value::Scalar;

/// What the decoder does after a callback returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flow {
    /// Keep decoding.
    #[default]
    Continue,
    /// Stop now. The decode returns `Ok(())` and reads nothing further.
    Break,
    /// Only meaningful from [`Handler::on_start_submessage`]: consume the
    /// submessage without any callbacks for its contents, including the
    /// matching `on_end_submessage`. Elsewhere it means `Continue`.
    SkipSubmessage,
}

/// Receiver of decoder events.
///
/// Callbacks arrive in wire order. Every `on_start_submessage` that returns
/// `Continue` is matched by exactly one `on_end_submessage` unless the decode
/// stops early. Field descriptors borrow from the registry for the duration
/// of the call.
pub trait Handler {
    /// A scalar, enum, string or bytes value. Elements of a packed run
    /// arrive one call per element.
    fn on_scalar_field(&mut self, field: &FieldDescriptor, value: Scalar) -> Flow;

    /// A submessage or group begins.
    fn on_start_submessage(&mut self, _field: &FieldDescriptor) -> Flow {
        Flow::Continue
    }

    /// The innermost open submessage or group ended.
    fn on_end_submessage(&mut self) -> Flow {
        Flow::Continue
    }

    /// A field the schema does not define. See [`crate::UnknownField`] for
    /// the byte layout of `tag` and `payload`.
    fn on_unknown_field(&mut self, _tag: &[u8], _payload: Bytes) -> Flow {
        Flow::Continue
    }
}

impl<H: Handler + ?Sized> Handler for &mut H {
    fn on_scalar_field(&mut self, field: &FieldDescriptor, value: Scalar) -> Flow {
        (**self).on_scalar_field(field, value)
    }

    fn on_start_submessage(&mut self, field: &FieldDescriptor) -> Flow {
        (**self).on_start_submessage(field)
    }

    fn on_end_submessage(&mut self) -> Flow {
        (**self).on_end_submessage()
    }

    fn on_unknown_field(&mut self, tag: &[u8], payload: Bytes) -> Flow {
        (**self).on_unknown_field(tag, payload)
    }
}

use protostream_def::{MessageId, ValueType};
use protostream_wire::{WireError, WireType};

/// Errors that abort a decode.
///
/// When a decode fails the handler has already received every callback for
/// the fields before the failure point, and nothing after it. Whether that
/// prefix is usable is the caller's decision.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// A varint ran past 10 bytes, overflowed 64 bits, or ended mid-sequence.
    #[error("malformed varint")]
    MalformedVarint,

    /// A value or nested message extends past the end of its input.
    #[error("truncated input (needed {needed} bytes, {available} available)")]
    TruncatedInput { needed: usize, available: usize },

    /// A length prefix does not fit the addressable range.
    #[error("length {0} exceeds the addressable range")]
    LengthOverflow(u64),

    /// Undefined wire type, out-of-range field number, or an end-group tag
    /// that closes nothing.
    #[error("invalid tag {0:#x}")]
    InvalidTag(u64),

    /// A known field arrived with a wire type its declared type does not allow.
    #[error("field {field}: expected wire type {expected}, found {actual}")]
    WireTypeMismatch {
        field: u32,
        expected: WireType,
        actual: WireType,
    },

    /// Messages or groups nested deeper than the configured limit.
    #[error("nesting exceeds the configured depth limit of {limit}")]
    NestingTooDeep { limit: usize },

    /// A string field holds bytes that are not UTF-8.
    #[error("field {field}: string is not valid UTF-8")]
    InvalidUtf8 { field: u32 },

    /// The message id does not belong to the registry in use.
    #[error("{0} is not defined in this registry")]
    UnknownMessage(MessageId),

    /// A submessage field whose type reference was never resolved. Only
    /// possible with descriptors built outside a registry.
    #[error("field {0} has no resolved message type")]
    UnresolvedField(u32),

    /// The byte source failed.
    #[error("decode I/O error: {0}")]
    Io(std::io::Error),
}

impl From<WireError> for DecodeError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::MalformedVarint => Self::MalformedVarint,
            WireError::TruncatedInput { needed, available } => {
                Self::TruncatedInput { needed, available }
            }
            WireError::LengthOverflow(len) => Self::LengthOverflow(len),
            WireError::InvalidTag(raw) => Self::InvalidTag(raw),
            WireError::Io(err) => Self::Io(err),
            WireError::SinkClosed => Self::Io(std::io::Error::other(err.to_string())),
        }
    }
}

/// Errors that abort an encode.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// A value was supplied for a field number the message does not define.
    #[error("{message}: no field numbered {number}")]
    UnknownField { message: String, number: u32 },

    /// A value does not match the field's declared type.
    #[error("field {field}: value does not match declared type {expected}")]
    ValueTypeMismatch { field: String, expected: ValueType },

    /// More than one value for a singular field.
    #[error("field {field}: multiple values for a non-repeated field")]
    MultipleValues { field: String },

    /// A required field has no value.
    #[error("{message}: missing required field {field}")]
    MissingRequired { message: String, field: String },

    /// Messages or groups nested deeper than the configured limit.
    #[error("nesting exceeds the configured depth limit of {limit}")]
    NestingTooDeep { limit: usize },

    /// `end_submessage` without a matching start, or `finish` with
    /// submessages still open.
    #[error("unbalanced submessage brackets")]
    UnbalancedSubmessage,

    /// The message id does not belong to the registry in use.
    #[error("{0} is not defined in this registry")]
    UnknownMessage(MessageId),

    /// Writing to the sink failed.
    #[error("encode wire error: {0}")]
    Wire(#[from] WireError),
}

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

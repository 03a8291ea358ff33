/// Errors that can occur while encoding or decoding wire-format primitives.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A varint ran past 10 bytes, overflowed 64 bits, or ended mid-sequence.
    #[error("malformed varint")]
    MalformedVarint,

    /// Fewer bytes remain than the value requires.
    #[error("truncated input (needed {needed} bytes, {available} available)")]
    TruncatedInput { needed: usize, available: usize },

    /// A length prefix does not fit the addressable range.
    #[error("length {0} exceeds the addressable range")]
    LengthOverflow(u64),

    /// The tag has field number 0, a field number above 2^29-1, or an undefined wire type.
    #[error("invalid tag {0:#x}")]
    InvalidTag(u64),

    /// An I/O error occurred on the underlying byte source or sink.
    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sink accepted zero bytes.
    #[error("sink closed")]
    SinkClosed,
}

pub type Result<T> = std::result::Result<T, WireError>;

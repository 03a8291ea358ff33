use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::codec::check_length;
use crate::error::{Result, WireError};
use crate::tag::Tag;
use crate::varint::{VarintAccumulator, MAX_VARINT_LEN};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Sequential, forward-only supply of bytes.
///
/// Implemented for complete in-memory buffers ([`SliceSource`]) and live
/// streams ([`ReadSource`]). Consumers never seek backwards.
pub trait ByteSource {
    /// Total bytes consumed since the source was created.
    fn position(&self) -> u64;

    /// Bytes known to remain, or `None` when the end is not yet known.
    fn remaining(&self) -> Option<usize>;

    /// Next byte, or `None` at end of input.
    fn next_byte(&mut self) -> Result<Option<u8>>;

    /// Exactly `len` bytes. Fails with `TruncatedInput`, consuming nothing,
    /// if the input ends first.
    fn read_bytes(&mut self, len: usize) -> Result<Bytes>;

    /// Discard exactly `len` bytes.
    fn skip(&mut self, len: usize) -> Result<()>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn position(&self) -> u64 {
        (**self).position()
    }

    fn remaining(&self) -> Option<usize> {
        (**self).remaining()
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        (**self).next_byte()
    }

    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        (**self).read_bytes(len)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        (**self).skip(len)
    }
}

/// Zero-copy source over an in-memory buffer.
///
/// Length-delimited payloads are handed out as slices of the original
/// `Bytes` without copying.
#[derive(Debug, Clone)]
pub struct SliceSource {
    buf: Bytes,
    total: usize,
}

impl SliceSource {
    /// Wrap a buffer.
    pub fn new(buf: impl Into<Bytes>) -> Self {
        let buf = buf.into();
        let total = buf.len();
        Self { buf, total }
    }

    /// Bytes not yet consumed.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// True once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl From<&'static [u8]> for SliceSource {
    fn from(value: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(value))
    }
}

impl ByteSource for SliceSource {
    fn position(&self) -> u64 {
        (self.total - self.buf.len()) as u64
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.buf.len())
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.buf.get_u8()))
    }

    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if len > self.buf.len() {
            return Err(WireError::TruncatedInput {
                needed: len,
                available: self.buf.len(),
            });
        }
        Ok(self.buf.split_to(len))
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        if len > self.buf.len() {
            return Err(WireError::TruncatedInput {
                needed: len,
                available: self.buf.len(),
            });
        }
        self.buf.advance(len);
        Ok(())
    }
}

/// Buffered source over any `Read` stream.
///
/// Handles partial reads internally; `Interrupted` reads are retried.
pub struct ReadSource<R> {
    inner: R,
    buf: BytesMut,
    consumed: u64,
    eof: bool,
}

impl<R: Read> ReadSource<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            consumed: 0,
            eof: false,
        }
    }

    /// Borrow the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Consume the source and return the reader. Buffered bytes are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read until at least `want` bytes are buffered or the stream ends.
    fn fill(&mut self, want: usize) -> Result<()> {
        while self.buf.len() < want && !self.eof {
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            };

            if read == 0 {
                trace!(consumed = self.consumed, "byte source reached end of stream");
                self.eof = true;
                break;
            }

            self.buf.extend_from_slice(&chunk[..read]);
            trace!(read, buffered = self.buf.len(), "filled byte source buffer");
        }
        Ok(())
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn position(&self) -> u64 {
        self.consumed
    }

    fn remaining(&self) -> Option<usize> {
        self.eof.then_some(self.buf.len())
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.buf.is_empty() {
            self.fill(1)?;
            if self.buf.is_empty() {
                return Ok(None);
            }
        }
        self.consumed += 1;
        Ok(Some(self.buf.get_u8()))
    }

    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.fill(len)?;
        if self.buf.len() < len {
            return Err(WireError::TruncatedInput {
                needed: len,
                available: self.buf.len(),
            });
        }
        self.consumed += len as u64;
        Ok(self.buf.split_to(len).freeze())
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        let mut left = len;
        while left > 0 {
            if self.buf.is_empty() {
                self.fill(1)?;
                if self.buf.is_empty() {
                    return Err(WireError::TruncatedInput {
                        needed: left,
                        available: 0,
                    });
                }
            }
            let step = left.min(self.buf.len());
            self.buf.advance(step);
            self.consumed += step as u64;
            left -= step;
        }
        Ok(())
    }
}

impl<R> std::fmt::Debug for ReadSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadSource")
            .field("buffered", &self.buf.len())
            .field("consumed", &self.consumed)
            .field("eof", &self.eof)
            .finish()
    }
}

/// A varint together with the exact bytes it was read from.
///
/// Keeping the original bytes lets unknown fields be re-emitted verbatim,
/// even when the producer used a non-minimal encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawVarint {
    pub value: u64,
    bytes: [u8; MAX_VARINT_LEN],
    len: u8,
}

impl RawVarint {
    /// The bytes as they appeared in the input.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// Read a varint, keeping its raw bytes. Returns `None` if the source is
/// exhausted before the first byte.
pub fn read_raw_varint<S: ByteSource + ?Sized>(src: &mut S) -> Result<Option<RawVarint>> {
    let mut acc = VarintAccumulator::default();
    let mut bytes = [0u8; MAX_VARINT_LEN];
    loop {
        let Some(byte) = src.next_byte()? else {
            if acc.is_empty() {
                return Ok(None);
            }
            return Err(WireError::MalformedVarint);
        };
        bytes[acc.len()] = byte;
        if let Some(value) = acc.push(byte)? {
            return Ok(Some(RawVarint {
                value,
                bytes,
                len: acc.len() as u8,
            }));
        }
        if acc.len() == MAX_VARINT_LEN {
            return Err(WireError::MalformedVarint);
        }
    }
}

/// Read a varint that must be present.
pub fn read_varint<S: ByteSource + ?Sized>(src: &mut S) -> Result<u64> {
    match read_raw_varint(src)? {
        Some(raw) => Ok(raw.value),
        None => Err(WireError::TruncatedInput {
            needed: 1,
            available: 0,
        }),
    }
}

/// Read the next tag, or `None` at a clean end of input.
pub fn read_tag<S: ByteSource + ?Sized>(src: &mut S) -> Result<Option<(Tag, RawVarint)>> {
    match read_raw_varint(src)? {
        Some(raw) => Ok(Some((Tag::decode(raw.value)?, raw))),
        None => Ok(None),
    }
}

/// Read a fixed32 value.
pub fn read_fixed32<S: ByteSource + ?Sized>(src: &mut S) -> Result<u32> {
    let bytes = src.read_bytes(4)?;
    crate::codec::decode_fixed32(&bytes)
}

/// Read a fixed64 value.
pub fn read_fixed64<S: ByteSource + ?Sized>(src: &mut S) -> Result<u64> {
    let bytes = src.read_bytes(8)?;
    crate::codec::decode_fixed64(&bytes)
}

/// Read a length prefix and check it against the input still available.
pub fn read_length<S: ByteSource + ?Sized>(src: &mut S) -> Result<usize> {
    let len = check_length(read_varint(src)?)?;
    if let Some(available) = src.remaining() {
        if len > available {
            return Err(WireError::TruncatedInput {
                needed: len,
                available,
            });
        }
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::tag::WireType;
    use crate::varint::encode_varint;

    #[test]
    fn slice_source_tracks_position() {
        let mut src = SliceSource::from(&b"\x08\x96\x01rest"[..]);
        let (tag, raw) = read_tag(&mut src).unwrap().unwrap();
        assert_eq!(tag.field_number, 1);
        assert_eq!(tag.wire_type, WireType::Varint);
        assert_eq!(raw.as_bytes(), &[0x08]);
        assert_eq!(read_varint(&mut src).unwrap(), 150);
        assert_eq!(src.position(), 3);
        assert_eq!(src.read_bytes(4).unwrap().as_ref(), b"rest");
        assert!(read_tag(&mut src).unwrap().is_none());
    }

    #[test]
    fn raw_varint_keeps_overlong_encoding() {
        let mut src = SliceSource::from(&[0x88u8, 0x80, 0x00][..]);
        let raw = read_raw_varint(&mut src).unwrap().unwrap();
        assert_eq!(raw.value, 8);
        assert_eq!(raw.as_bytes(), &[0x88, 0x80, 0x00]);
    }

    #[test]
    fn varint_cut_off_mid_sequence() {
        let mut src = SliceSource::from(&[0x96u8][..]);
        assert!(matches!(
            read_varint(&mut src),
            Err(WireError::MalformedVarint)
        ));
    }

    #[test]
    fn slice_read_past_end_consumes_nothing() {
        let mut src = SliceSource::from(&b"abc"[..]);
        assert!(matches!(
            src.read_bytes(4),
            Err(WireError::TruncatedInput {
                needed: 4,
                available: 3
            })
        ));
        assert_eq!(src.position(), 0);
        assert!(src.skip(5).is_err());
        assert_eq!(src.as_slice(), b"abc");
    }

    #[test]
    fn read_length_checks_remaining() {
        let mut buf = BytesMut::new();
        encode_varint(10, &mut buf);
        buf.extend_from_slice(b"short");
        let mut src = SliceSource::new(buf.freeze());
        assert!(matches!(
            read_length(&mut src),
            Err(WireError::TruncatedInput {
                needed: 10,
                available: 5
            })
        ));
        assert_eq!(src.remaining(), Some(5));
    }

    #[test]
    fn read_source_handles_partial_reads() {
        let reader = ByteByByteReader {
            bytes: b"\x12\x03abc\x25\x01\x00\x00\x00".to_vec(),
            pos: 0,
        };
        let mut src = ReadSource::new(reader);

        let (tag, _) = read_tag(&mut src).unwrap().unwrap();
        assert_eq!(tag.wire_type, WireType::LengthDelimited);
        let len = read_length(&mut src).unwrap();
        assert_eq!(src.read_bytes(len).unwrap().as_ref(), b"abc");

        let (tag, _) = read_tag(&mut src).unwrap().unwrap();
        assert_eq!(tag.field_number, 4);
        assert_eq!(read_fixed32(&mut src).unwrap(), 1);
        assert!(read_tag(&mut src).unwrap().is_none());
        assert_eq!(src.position(), 10);
    }

    #[test]
    fn read_source_truncated_payload() {
        let mut src = ReadSource::new(Cursor::new(b"ab".to_vec()));
        assert!(matches!(
            src.read_bytes(3),
            Err(WireError::TruncatedInput {
                needed: 3,
                available: 2
            })
        ));
        assert_eq!(src.remaining(), Some(2));
        assert!(src.skip(3).is_err());
    }

    #[test]
    fn read_source_skip_spans_chunks() {
        let data = vec![7u8; READ_CHUNK_SIZE * 2 + 5];
        let mut src = ReadSource::new(Cursor::new(data));
        src.skip(READ_CHUNK_SIZE * 2).unwrap();
        assert_eq!(src.read_bytes(5).unwrap().as_ref(), &[7; 5]);
        assert!(src.next_byte().unwrap().is_none());
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(vec![0x08, 0x01]),
        };
        let mut src = ReadSource::new(reader);
        let (tag, _) = read_tag(&mut src).unwrap().unwrap();
        assert_eq!(tag.field_number, 1);
        assert_eq!(read_varint(&mut src).unwrap(), 1);
    }

    #[test]
    fn io_error_propagates() {
        let mut src = ReadSource::new(FailingReader);
        assert!(matches!(src.next_byte(), Err(WireError::Io(_))));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }
    }
}

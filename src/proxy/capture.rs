//! Bounded copy of a relayed response

use bytes::{Bytes, BytesMut};

/// Accumulates relayed bytes up to a fixed limit.
///
/// Once an append would cross the limit the capture is abandoned for good:
/// the buffered bytes are released and [`CaptureBuffer::finish`] yields
/// nothing. Appends past that point are ignored.
#[derive(Debug)]
pub struct CaptureBuffer {
    buf: BytesMut,
    limit: usize,
    overflowed: bool,
}

impl CaptureBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
            overflowed: false,
        }
    }

    /// Appends `chunk` if it fits. Returns false once the capture is abandoned.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        if self.overflowed {
            return false;
        }

        if chunk.len() > self.limit - self.buf.len() {
            self.overflowed = true;
            self.buf = BytesMut::new();
            return false;
        }

        self.buf.extend_from_slice(chunk);
        true
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// The captured bytes, unless the limit was crossed.
    pub fn finish(self) -> Option<Bytes> {
        if self.overflowed {
            None
        } else {
            Some(self.buf.freeze())
        }
    }
}

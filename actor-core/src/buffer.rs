//! Owned message payload with reserved front space for framing.
//!
//! Downstream transports (out of scope for this crate) routinely need to
//! prepend a length or type header onto an already-built payload.
//! [`Buffer`] keeps a configurable amount of headroom before the valid
//! data so that `write_front` is a plain decrement-and-copy rather than a
//! full reallocation/shift.

use std::ops::Deref;

/// Default headroom reserved in front of a freshly allocated buffer.
const DEFAULT_FRONT_RESERVE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
    head: usize,
}

impl Buffer {
    /// A buffer with `back_capacity` bytes of room after the default
    /// front reservation.
    pub fn with_capacity(back_capacity: usize) -> Self {
        Self::with_reserve(DEFAULT_FRONT_RESERVE, back_capacity)
    }

    /// A buffer with an explicit front reservation and back capacity.
    pub fn with_reserve(front_reserve: usize, back_capacity: usize) -> Self {
        let data = vec![0u8; front_reserve + back_capacity];
        Buffer {
            data,
            head: front_reserve + back_capacity,
        }
    }

    /// Wraps already-built bytes with no reserved headroom.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Buffer { data, head: 0 }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.head..]
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends bytes to the end of the valid region, growing as needed.
    pub fn write_back(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Prepends bytes before the valid region.
    ///
    /// If there isn't enough reserved headroom, the buffer is rebuilt
    /// with fresh headroom; this is the same trade-off the original
    /// makes (framing prepends are rare and small, so an occasional
    /// reallocation is cheaper than always carrying generous slack).
    pub fn write_front(&mut self, bytes: &[u8]) {
        if bytes.len() <= self.head {
            self.head -= bytes.len();
            self.data[self.head..self.head + bytes.len()].copy_from_slice(bytes);
            return;
        }

        let mut rebuilt = Vec::with_capacity(bytes.len() + self.len() + DEFAULT_FRONT_RESERVE);
        rebuilt.extend_from_slice(bytes);
        rebuilt.extend_from_slice(self.as_slice());
        self.data = rebuilt;
        self.head = 0;
    }

    pub fn into_shared(self) -> SharedBuffer {
        let head = self.head;
        SharedBuffer(bytes::Bytes::from(self.data).slice(head..))
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::with_capacity(0)
    }
}

/// A read-only buffer shared by reference across many envelopes.
///
/// Used for broadcast fan-out: one payload, one allocation, cloned cheaply
/// (a refcount bump, the same `bytes::Bytes` a Thrift-style body type is
/// built on) into every worker's envelope.
#[derive(Debug, Clone)]
pub struct SharedBuffer(bytes::Bytes);

impl Deref for SharedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl From<Buffer> for SharedBuffer {
    fn from(buf: Buffer) -> Self {
        buf.into_shared()
    }
}

/// Payload carried by an [`Envelope`](crate::envelope::Envelope): either
/// owned outright (the common case for a direct send) or shared by
/// reference (the broadcast case, where every worker gets its own
/// envelope pointing at the same bytes).
#[derive(Debug, Clone)]
pub enum Payload {
    Owned(Buffer),
    Shared(SharedBuffer),
}

impl Payload {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Payload::Owned(b) => b.as_slice(),
            Payload::Shared(b) => b.deref(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Owned(Buffer::default())
    }
}

impl Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_back_appends() {
        let mut b = Buffer::with_capacity(0);
        b.write_back(b"hello");
        assert_eq!(b.as_slice(), b"hello");
    }

    #[test]
    fn write_front_uses_reserved_headroom() {
        let mut b = Buffer::with_capacity(4);
        b.write_back(b"body");
        b.write_front(b"hdr:");
        assert_eq!(b.as_slice(), b"hdr:body");
    }

    #[test]
    fn write_front_rebuilds_when_headroom_exhausted() {
        let mut b = Buffer::with_reserve(2, 0);
        b.write_back(b"body");
        b.write_front(b"longer-header:");
        assert_eq!(b.as_slice(), b"longer-header:body");
    }

    #[test]
    fn shared_buffer_clones_cheaply() {
        let mut b = Buffer::with_capacity(0);
        b.write_back(b"ping");
        let shared: SharedBuffer = b.into();
        let clone_a = shared.clone();
        let clone_b = shared.clone();
        assert_eq!(&*clone_a, b"ping");
        assert_eq!(&*clone_b, b"ping");
    }
}

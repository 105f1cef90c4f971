use std::cell::{Ref, RefCell};
use std::rc::Rc;

use streamer_shared::{Error, Result};

/// Default prepend headroom reserved ahead of the payload so that a later
/// caller can write a container/RTP header without reallocating.
pub const DEFAULT_HEADROOM: usize = 128;

struct Inner {
    data: Vec<u8>,
    start: usize,
    end: usize,
}

/// An owned byte vector with a front offset that can move backward into a
/// reserved headroom (to prepend a header in place) and forward to consume
/// bytes already read, plus a tail offset that only grows.
///
/// Sharing is by reference-counted handle (`Rc<RefCell<_>>`); there is
/// never more than one writer, matching the single-threaded pipeline stage
/// that owns a packet at any instant.
#[derive(Clone)]
pub struct ByteBuf {
    inner: Rc<RefCell<Inner>>,
}

impl ByteBuf {
    /// New empty buffer with the default headroom reserved.
    pub fn new() -> Self {
        Self::with_headroom(DEFAULT_HEADROOM)
    }

    /// New empty buffer with `headroom` bytes reserved ahead of the data
    /// start, and `capacity` bytes of total backing storage.
    pub fn with_capacity(headroom: usize, capacity: usize) -> Self {
        let mut data = Vec::with_capacity(headroom + capacity);
        data.resize(headroom, 0);
        Self {
            inner: Rc::new(RefCell::new(Inner {
                data,
                start: headroom,
                end: headroom,
            })),
        }
    }

    fn with_headroom(headroom: usize) -> Self {
        Self::with_capacity(headroom, 0)
    }

    /// Buffer pre-filled with `bytes`, with the default headroom ahead of it.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let buf = Self::with_capacity(DEFAULT_HEADROOM, bytes.len());
        buf.append_data(bytes);
        buf
    }

    /// Number of readable bytes between the current start and end offsets.
    pub fn data_len(&self) -> usize {
        let inner = self.inner.borrow();
        inner.end - inner.start
    }

    /// True if there are no readable bytes.
    pub fn is_empty(&self) -> bool {
        self.data_len() == 0
    }

    /// Borrow the readable region.
    pub fn data(&self) -> Ref<'_, [u8]> {
        Ref::map(self.inner.borrow(), |inner| &inner.data[inner.start..inner.end])
    }

    /// Copy the readable region out into an owned vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data().to_vec()
    }

    /// Append bytes at the tail, growing the backing storage as needed.
    pub fn append_data(&self, bytes: &[u8]) {
        let mut inner = self.inner.borrow_mut();
        let end = inner.end;
        inner.data.truncate(end);
        inner.data.extend_from_slice(bytes);
        inner.end += bytes.len();
    }

    /// Write `bytes` immediately before the current start, moving the
    /// start offset backward. Fails if fewer than `bytes.len()` bytes of
    /// headroom remain.
    pub fn prepend_data(&self, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if bytes.len() > inner.start {
            return Err(Error::ErrBufferTooShort);
        }
        let new_start = inner.start - bytes.len();
        let old_start = inner.start;
        inner.data[new_start..old_start].copy_from_slice(bytes);
        inner.start = new_start;
        Ok(())
    }

    /// Move the consume pointer forward by `n` bytes (bytes already
    /// processed are dropped from the readable view, not freed).
    pub fn consume(&self, n: usize) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.start + n > inner.end {
            return Err(Error::ErrBufferTooShort);
        }
        inner.start += n;
        Ok(())
    }

    /// Move the consume pointer backward by `n` bytes, un-consuming
    /// previously-skipped header bytes. Fails if fewer than `n` bytes of
    /// headroom remain before the start offset.
    pub fn rewind(&self, n: usize) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if n > inner.start {
            return Err(Error::ErrBufferTooShort);
        }
        inner.start -= n;
        Ok(())
    }

    /// Remaining headroom bytes available ahead of the start offset.
    pub fn headroom(&self) -> usize {
        self.inner.borrow().start
    }

    /// Deep copy with the default headroom reserved, matching the
    /// source's `copy()`/copy-constructor semantics (independent storage,
    /// same readable bytes).
    pub fn deep_clone(&self) -> Self {
        Self::from_slice(&self.data())
    }
}

impl Default for ByteBuf {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_consume_roundtrip() {
        let buf = ByteBuf::new();
        buf.append_data(b"hello world");
        assert_eq!(buf.data_len(), 11);
        buf.consume(6).unwrap();
        assert_eq!(&*buf.data(), b"world");
    }

    #[test]
    fn prepend_writes_into_reserved_headroom() {
        let buf = ByteBuf::with_capacity(4, 8);
        buf.append_data(b"payload");
        buf.prepend_data(&[0, 1, 2, 3]).unwrap();
        assert_eq!(&*buf.data(), b"\x00\x01\x02\x03payload");
    }

    #[test]
    fn prepend_beyond_headroom_fails() {
        let buf = ByteBuf::with_capacity(2, 8);
        buf.append_data(b"x");
        assert!(buf.prepend_data(&[0, 1, 2]).is_err());
    }

    #[test]
    fn consume_then_rewind_restores_view() {
        let buf = ByteBuf::new();
        buf.append_data(b"abcdef");
        buf.consume(3).unwrap();
        assert_eq!(&*buf.data(), b"def");
        buf.rewind(3).unwrap();
        assert_eq!(&*buf.data(), b"abcdef");
    }

    #[test]
    fn clone_shares_storage_deep_clone_does_not() {
        let buf = ByteBuf::new();
        buf.append_data(b"shared");
        let shallow = buf.clone();
        buf.append_data(b"-more");
        assert_eq!(shallow.data_len(), buf.data_len());

        let deep = buf.deep_clone();
        buf.append_data(b"-even-more");
        assert_ne!(deep.data_len(), buf.data_len());
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;
use std::collections::vec_deque;
use std::fmt;

use crate::segment::Segment;
use crate::{ByteCursor, SEGMENT_SIZE};

/// Segments shorter than this are copied into the tail of the receiving buffer instead of
/// being linked in as-is, which keeps small writes from fragmenting a buffer into many
/// mostly-empty segments.
const COMPACTION_THRESHOLD: usize = SEGMENT_SIZE / 2;

/// An ordered, growable sequence of bytes.
///
/// The buffer owns a queue of segments. New bytes are appended to the last segment and bytes are
/// consumed from the first one, so both ends are cheap to operate on regardless of how much data
/// the buffer holds.
///
/// # Ownership transfer
///
/// [`move_from()`][Self::move_from] transfers bytes between buffers. Whole segments change owner
/// without their contents being copied; only a partially transferred segment at the end of the
/// range is copied.
///
/// # Scoped access to segment memory
///
/// [`write_with()`][Self::write_with] and [`read_with()`][Self::read_with] lend a segment's memory
/// to a closure. The closure's return value determines how many bytes are committed or consumed.
/// Nothing else may touch the buffer while the closure runs, which the borrow checker enforces.
///
/// # Example
///
/// ```
/// use pipebuf::Buffer;
///
/// let mut inbound = Buffer::from(b"Hello, world!");
/// let mut outbound = Buffer::new();
///
/// outbound.move_from(&mut inbound, 5);
///
/// assert_eq!(outbound.to_vec(), b"Hello");
/// assert_eq!(inbound.to_vec(), b", world!");
/// ```
#[derive(Default)]
pub struct Buffer {
    // Never contains empty segments. Every operation that may leave a segment empty removes it.
    segments: VecDeque<Segment>,

    // Cached sum of the readable lengths of all segments.
    len: usize,
}

impl Buffer {
    /// Creates an empty buffer that owns no memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer holding a copy of `data`.
    #[must_use]
    pub fn copied_from_slice(data: &[u8]) -> Self {
        let mut buffer = Self::new();
        buffer.put_slice(data);
        buffer
    }

    /// Number of readable bytes in the buffer.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no readable bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of segments currently backing the buffer.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Appends a copy of `data` to the end of the buffer.
    pub fn put_slice(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let copied = self.writable_tail(1).push_slice(data);
            self.len += copied;
            data = &data[copied..];
        }
    }

    /// Appends a single byte to the end of the buffer.
    pub fn put_byte(&mut self, byte: u8) {
        self.put_slice(&[byte]);
    }

    /// Removes and returns the first byte of the buffer, or `None` if the buffer is empty.
    pub fn get_byte(&mut self) -> Option<u8> {
        let head = self.segments.front_mut()?;
        let byte = head.readable()[0];
        head.consume(1);
        self.len -= 1;

        if head.is_empty() {
            self.segments.pop_front();
        }

        Some(byte)
    }

    /// Discards the first `count` bytes of the buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer holds fewer than `count` bytes.
    pub fn skip(&mut self, mut count: usize) {
        assert!(
            count <= self.len,
            "cannot skip {count} bytes of a buffer holding {} bytes",
            self.len
        );

        self.len -= count;

        while count > 0 {
            let Some(head) = self.segments.front_mut() else {
                break;
            };

            let step = head.len().min(count);
            head.consume(step);
            count -= step;

            if head.is_empty() {
                self.segments.pop_front();
            }
        }
    }

    /// Removes the first `dst.len()` bytes of the buffer and copies them into `dst`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer holds fewer than `dst.len()` bytes.
    pub fn copy_to_slice(&mut self, dst: &mut [u8]) {
        assert!(
            dst.len() <= self.len,
            "cannot copy {} bytes out of a buffer holding {} bytes",
            dst.len(),
            self.len
        );

        let mut filled = 0;

        while filled < dst.len() {
            let Some(head) = self.segments.front_mut() else {
                break;
            };

            let step = head.len().min(dst.len() - filled);
            dst[filled..filled + step].copy_from_slice(&head.readable()[..step]);
            head.consume(step);
            filled += step;

            if head.is_empty() {
                self.segments.pop_front();
            }
        }

        self.len -= filled;
    }

    /// Removes the first `count` bytes of the buffer and returns them as a contiguous vector.
    ///
    /// # Panics
    ///
    /// Panics if the buffer holds fewer than `count` bytes.
    #[must_use]
    pub fn consume_to_vec(&mut self, count: usize) -> Vec<u8> {
        let mut bytes = vec![0; count];
        self.copy_to_slice(&mut bytes);
        bytes
    }

    /// Returns a copy of the readable bytes without consuming them.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len);
        for chunk in self.chunks() {
            bytes.extend_from_slice(chunk);
        }
        bytes
    }

    /// Discards all readable bytes and releases the backing segments.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.len = 0;
    }

    /// Iterates over the readable bytes one contiguous slice at a time.
    #[must_use]
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks {
            inner: self.segments.iter(),
        }
    }

    /// Moves the first `byte_count` bytes of `source` to the end of this buffer.
    ///
    /// Segments that are transferred in full change owner without being copied.
    ///
    /// # Panics
    ///
    /// Panics if `source` holds fewer than `byte_count` bytes.
    pub fn move_from(&mut self, source: &mut Self, byte_count: usize) {
        assert!(
            byte_count <= source.len,
            "cannot move {byte_count} bytes out of a buffer holding {} bytes",
            source.len
        );

        let mut remaining = byte_count;

        while remaining > 0 {
            let Some(head) = source.segments.front_mut() else {
                break;
            };

            let head_len = head.len();

            if head_len <= remaining {
                let Some(segment) = source.segments.pop_front() else {
                    break;
                };

                source.len -= head_len;
                remaining -= head_len;
                self.push_segment(segment);
            } else {
                self.put_slice(&head.readable()[..remaining]);
                head.consume(remaining);
                source.len -= remaining;
                remaining = 0;
            }
        }
    }

    /// Lends up to `max_len` bytes of spare capacity to `f` and commits the number of bytes
    /// that `f` reports as written.
    ///
    /// The buffer is expanded with a new segment first if the current tail segment cannot offer
    /// at least `min(max_len, SEGMENT_SIZE)` bytes. The cursor therefore exposes
    /// `min(max_len, SEGMENT_SIZE)` bytes or more, up to `max_len`.
    ///
    /// If `f` returns an error or commits zero bytes, any segment added for the call is released
    /// again and the buffer is left unchanged.
    ///
    /// If `max_len` is zero, `f` is not called and `Ok(0)` is returned.
    ///
    /// # Errors
    ///
    /// Returns whatever error `f` returns.
    ///
    /// # Panics
    ///
    /// Panics if `f` reports more bytes written than the cursor exposed.
    pub fn write_with<F, E>(&mut self, max_len: usize, f: F) -> Result<usize, E>
    where
        F: FnOnce(&mut ByteCursor<'_>) -> Result<usize, E>,
    {
        if max_len == 0 {
            return Ok(0);
        }

        let outcome = {
            let tail = self.writable_tail(max_len.min(SEGMENT_SIZE));
            let start = tail.end;
            let end = start + tail.spare().min(max_len);

            let mut cursor = ByteCursor::new(&mut tail.data, start, end);
            let outcome = f(&mut cursor);

            if let Ok(written) = &outcome {
                assert!(
                    *written <= end - start,
                    "committed {written} bytes but the cursor only exposed {} bytes",
                    end - start
                );
                tail.end += *written;
            }

            outcome
        };

        self.release_empty_tail();

        let written = outcome?;
        self.len += written;
        Ok(written)
    }

    /// Lends the readable bytes of the first segment to `f` and consumes the number of bytes
    /// that `f` reports as used.
    ///
    /// If the buffer is empty, `f` is not called and `Ok(0)` is returned.
    ///
    /// # Errors
    ///
    /// Returns whatever error `f` returns. Nothing is consumed in that case.
    ///
    /// # Panics
    ///
    /// Panics if `f` reports more bytes consumed than it was shown.
    pub fn read_with<F, E>(&mut self, f: F) -> Result<usize, E>
    where
        F: FnOnce(&[u8]) -> Result<usize, E>,
    {
        let Some(head) = self.segments.front_mut() else {
            return Ok(0);
        };

        let readable = head.len();
        let consumed = f(head.readable())?;

        assert!(
            consumed <= readable,
            "consumed {consumed} bytes but only {readable} bytes were readable"
        );

        head.consume(consumed);
        if head.is_empty() {
            self.segments.pop_front();
        }

        self.len -= consumed;
        Ok(consumed)
    }

    fn writable_tail(&mut self, min_spare: usize) -> &mut Segment {
        debug_assert!(min_spare > 0 && min_spare <= SEGMENT_SIZE);

        let needs_segment = self.segments.back().is_none_or(|tail| tail.spare() < min_spare);
        if needs_segment {
            self.segments.push_back(Segment::new());
        }

        self.segments.back_mut().expect("a writable segment was ensured above")
    }

    fn push_segment(&mut self, segment: Segment) {
        let len = segment.len();

        match self.segments.back_mut() {
            Some(tail) if len < COMPACTION_THRESHOLD && tail.spare() >= len => {
                tail.push_slice(segment.readable());
            }
            _ => self.segments.push_back(segment),
        }

        self.len += len;
    }

    fn release_empty_tail(&mut self) {
        if self.segments.back().is_some_and(Segment::is_empty) {
            self.segments.pop_back();
        }
    }
}

impl fmt::Debug for Buffer {
    #[cfg_attr(test, mutants::skip)] // We have no API contract for this.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len)
            .field("segments", &self.segments.len())
            .finish()
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self
                .chunks()
                .flatten()
                .zip(other.chunks().flatten())
                .all(|(left, right)| left == right)
    }
}

impl Eq for Buffer {}

impl From<&[u8]> for Buffer {
    fn from(value: &[u8]) -> Self {
        Self::copied_from_slice(value)
    }
}

impl<const N: usize> From<&[u8; N]> for Buffer {
    fn from(value: &[u8; N]) -> Self {
        Self::copied_from_slice(value)
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(value: Vec<u8>) -> Self {
        Self::copied_from_slice(&value)
    }
}

/// Iterator over the readable slices of a [`Buffer`], returned by [`Buffer::chunks()`].
#[derive(Debug)]
pub struct Chunks<'a> {
    inner: vec_deque::Iter<'a, Segment>,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(Segment::readable)
    }
}

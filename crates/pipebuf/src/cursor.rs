// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// A bounded, writable view into the spare capacity of a [`Buffer`][crate::Buffer] segment.
///
/// A cursor is only ever handed out by reference to the closure passed to
/// [`Buffer::write_with()`][crate::Buffer::write_with] and cannot be retained after the closure
/// returns. The region it exposes is `start()..end()` of the underlying segment.
///
/// The cursor's memory is initialized but its contents are unspecified - it may contain bytes
/// that were never committed by earlier writes. Only the prefix that the closure reports as
/// written becomes part of the buffer.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    data: &'a mut [u8],
    start: usize,
    end: usize,
}

impl<'a> ByteCursor<'a> {
    pub(crate) fn new(data: &'a mut [u8], start: usize, end: usize) -> Self {
        debug_assert!(start <= end && end <= data.len());
        Self { data, start, end }
    }

    /// Offset of the first exposed byte within the backing segment.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Offset one past the last exposed byte within the backing segment.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Number of bytes that may be written through this cursor.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the cursor exposes no bytes at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The exposed region, ready to be filled from its beginning.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.start..self.end]
    }

    /// The exposed region as a shared slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }
}

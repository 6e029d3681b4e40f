// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use crate::SEGMENT_SIZE;

/// One contiguous block of memory owned by a `Buffer`.
///
/// Bytes in `start..end` are readable. Bytes in `end..data.len()` are spare capacity that the
/// owning buffer may fill. Bytes before `start` have already been consumed and are never reused.
pub(crate) struct Segment {
    pub(crate) data: Box<[u8]>,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Segment {
    pub(crate) fn new() -> Self {
        Self {
            data: vec![0; SEGMENT_SIZE].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    pub(crate) fn readable(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    pub(crate) const fn len(&self) -> usize {
        self.end - self.start
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub(crate) fn spare(&self) -> usize {
        self.data.len() - self.end
    }

    /// Appends as much of `data` as fits, returning the number of bytes copied.
    pub(crate) fn push_slice(&mut self, data: &[u8]) -> usize {
        let count = self.spare().min(data.len());
        self.data[self.end..self.end + count].copy_from_slice(&data[..count]);
        self.end += count;
        count
    }

    /// Marks `count` readable bytes as consumed.
    pub(crate) fn consume(&mut self, count: usize) {
        debug_assert!(count <= self.len());
        self.start += count;
    }
}

impl fmt::Debug for Segment {
    #[cfg_attr(test, mutants::skip)] // We have no API contract for this.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("start", &self.start)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

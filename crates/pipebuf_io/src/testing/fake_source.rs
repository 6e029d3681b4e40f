// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::num::NonZero;

use pipebuf::Buffer;

use crate::{Error, Result, Source, Timeout, check_read_request};

/// A [`Source`] that reads from an in-memory buffer.
///
/// This is for test and example purposes only and is not optimized for performance.
#[derive(Debug)]
pub struct FakeSource {
    contents: Buffer,

    // For testing purposes, we may choose to limit the read size and
    // thereby force the caller to do multiple read operations.
    max_read_size: Option<NonZero<usize>>,

    timeout: Timeout,
    read_calls: usize,
    closed: bool,
}

impl FakeSource {
    /// Starts building a new `FakeSource`.
    #[must_use]
    pub fn builder() -> FakeSourceBuilder {
        FakeSourceBuilder {
            contents: Buffer::new(),
            max_read_size: None,
            timeout: Timeout::none(),
        }
    }

    /// Creates a new `FakeSource` with the given contents and the default configuration.
    #[must_use]
    pub fn new(contents: impl Into<Buffer>) -> Self {
        Self::builder().contents(contents).build()
    }

    /// Number of bytes that have not been read yet.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.contents.len()
    }

    /// Number of non-empty read requests received so far, including those that reported the end
    /// of the stream.
    #[must_use]
    pub const fn read_calls(&self) -> usize {
        self.read_calls
    }

    /// Whether [`close()`][Source::close] has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Source for FakeSource {
    #[cfg_attr(test, mutants::skip)] // Mutations easily lead to infinite loops, not worth the effort.
    fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>> {
        check_read_request(byte_count)?;

        if self.closed {
            return Err(Error::ClosedResource);
        }

        if byte_count == 0 {
            return Ok(Some(0));
        }

        self.read_calls += 1;

        if self.contents.is_empty() {
            return Ok(None);
        }

        let count = byte_count
            .min(self.contents.len())
            .min(self.max_read_size.map_or(usize::MAX, NonZero::get));

        sink.move_from(&mut self.contents, count);
        Ok(Some(count))
    }

    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn timeout(&self) -> &Timeout {
        &self.timeout
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Creates an instance of [`FakeSource`].
///
/// Access through [`FakeSource::builder()`][FakeSource::builder].
#[derive(Debug)]
pub struct FakeSourceBuilder {
    contents: Buffer,
    max_read_size: Option<NonZero<usize>>,
    timeout: Timeout,
}

impl FakeSourceBuilder {
    /// The data to return from the source.
    ///
    /// Optional. Defaults to an empty stream.
    #[must_use]
    pub fn contents(mut self, contents: impl Into<Buffer>) -> Self {
        self.contents = contents.into();
        self
    }

    /// The maximum number of bytes to return in a single read operation.
    ///
    /// Optional. Defaults to no limit (as much as the caller asks for).
    #[must_use]
    pub fn max_read_size(mut self, max_read_size: NonZero<usize>) -> Self {
        self.max_read_size = Some(max_read_size);
        self
    }

    /// The timeout policy reported by the source.
    ///
    /// Optional. Defaults to [`Timeout::none()`]. The fake never blocks, so the policy is only
    /// reported, never enforced.
    #[must_use]
    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the `FakeSource` with the provided configuration.
    #[must_use]
    pub fn build(self) -> FakeSource {
        FakeSource {
            contents: self.contents,
            max_read_size: self.max_read_size,
            timeout: self.timeout,
            read_calls: 0,
            closed: false,
        }
    }
}

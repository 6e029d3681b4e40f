// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use pipebuf::Buffer;

use crate::{Error, Result, Sink, Timeout, check_write_request};

/// A [`Sink`] that collects all written data into itself and records how it was called.
///
/// This is for test and example purposes only and is not optimized for performance.
#[derive(Debug)]
pub struct FakeSink {
    contents: Vec<u8>,
    write_sizes: Vec<usize>,
    flush_count: usize,
    close_count: usize,
    timeout: Timeout,
}

impl FakeSink {
    /// Starts building a new `FakeSink`.
    #[must_use]
    pub fn builder() -> FakeSinkBuilder {
        FakeSinkBuilder { timeout: Timeout::none() }
    }

    /// Creates a new `FakeSink` with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// The bytes written so far.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Consumes the instance and returns the bytes that were written to it.
    #[must_use]
    pub fn into_contents(self) -> Vec<u8> {
        self.contents
    }

    /// The `byte_count` of every successful write, in call order.
    #[must_use]
    pub fn write_sizes(&self) -> &[usize] {
        &self.write_sizes
    }

    /// Number of successful [`flush()`][Sink::flush] calls.
    #[must_use]
    pub const fn flush_count(&self) -> usize {
        self.flush_count
    }

    /// Number of [`close()`][Sink::close] calls, including repeated ones.
    #[must_use]
    pub const fn close_count(&self) -> usize {
        self.close_count
    }

    /// Whether [`close()`][Sink::close] has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.close_count > 0
    }
}

impl Default for FakeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for FakeSink {
    fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<()> {
        check_write_request(source, byte_count)?;

        if self.is_closed() {
            return Err(Error::ClosedResource);
        }

        self.contents.extend(source.consume_to_vec(byte_count));
        self.write_sizes.push(byte_count);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ClosedResource);
        }

        self.flush_count += 1;
        Ok(())
    }

    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn timeout(&self) -> &Timeout {
        &self.timeout
    }

    fn close(&mut self) -> Result<()> {
        self.close_count += 1;
        Ok(())
    }
}

/// Creates an instance of [`FakeSink`].
///
/// Access through [`FakeSink::builder()`][FakeSink::builder].
#[derive(Debug)]
pub struct FakeSinkBuilder {
    timeout: Timeout,
}

impl FakeSinkBuilder {
    /// The timeout policy reported by the sink.
    ///
    /// Optional. Defaults to [`Timeout::none()`]. The fake never blocks, so the policy is only
    /// reported, never enforced.
    #[must_use]
    pub const fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the `FakeSink` with the provided configuration.
    #[must_use]
    pub fn build(self) -> FakeSink {
        FakeSink {
            contents: Vec::new(),
            write_sizes: Vec::new(),
            flush_count: 0,
            close_count: 0,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls() {
        let mut sink = FakeSink::new();
        let mut source = Buffer::copied_from_slice(b"abcdef");

        sink.write(&mut source, 2).unwrap();
        sink.write(&mut source, 3).unwrap();
        sink.flush().unwrap();

        assert_eq!(sink.contents(), b"abcde");
        assert_eq!(sink.write_sizes(), &[2, 3]);
        assert_eq!(sink.flush_count(), 1);
        assert_eq!(source.to_vec(), b"f");

        sink.close().unwrap();
        sink.close().unwrap();
        assert_eq!(sink.close_count(), 2);
        assert!(matches!(sink.write(&mut source, 1), Err(Error::ClosedResource)));
    }
}

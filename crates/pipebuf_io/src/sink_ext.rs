// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use pipebuf::Buffer;

use crate::{Result, Sink};

/// Universal convenience methods built on top of [`Sink`].
///
/// This trait is implemented for all types that implement [`Sink`].
pub trait SinkExt: Sink {
    /// Copies `data` into a buffer and writes all of it.
    ///
    /// # Example
    ///
    /// ```
    /// use pipebuf_io::{ChannelSink, SinkExt};
    ///
    /// let mut sink = ChannelSink::new(Vec::new());
    /// sink.write_slice(b"Hello").unwrap();
    /// sink.write_slice(b", world!").unwrap();
    ///
    /// assert_eq!(sink.into_inner().unwrap(), b"Hello, world!");
    /// ```
    ///
    /// # Errors
    ///
    /// Any error of the sink is forwarded.
    fn write_slice(&mut self, data: &[u8]) -> Result<()>;

    /// Writes every byte currently in `source`, leaving it empty on success.
    ///
    /// # Errors
    ///
    /// Any error of the sink is forwarded.
    fn write_all_from(&mut self, source: &mut Buffer) -> Result<()>;
}

impl<T> SinkExt for T
where
    T: Sink + ?Sized,
{
    fn write_slice(&mut self, data: &[u8]) -> Result<()> {
        let mut buffer = Buffer::copied_from_slice(data);
        let len = buffer.len();
        self.write(&mut buffer, len)
    }

    fn write_all_from(&mut self, source: &mut Buffer) -> Result<()> {
        let len = source.len();
        self.write(source, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSink;

    #[test]
    fn write_slice_forwards_one_write() {
        let mut sink = FakeSink::new();

        sink.write_slice(b"abc").unwrap();
        sink.write_slice(b"").unwrap();

        assert_eq!(sink.contents(), b"abc");
        assert_eq!(sink.write_sizes(), &[3, 0]);
    }

    #[test]
    fn write_all_from_drains_source() {
        let mut sink = FakeSink::new();
        let mut source = Buffer::copied_from_slice(b"Hello, world!");

        sink.write_all_from(&mut source).unwrap();

        assert!(source.is_empty());
        assert_eq!(sink.contents(), b"Hello, world!");
    }
}

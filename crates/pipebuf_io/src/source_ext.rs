// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::ErrorKind;

use pipebuf::{Buffer, SEGMENT_SIZE};

use crate::{Error, Result, Sink, Source};

/// Universal convenience methods built on top of [`Source`].
///
/// This trait is implemented for all types that implement [`Source`].
pub trait SourceExt: Source {
    /// Reads exactly `byte_count` bytes into a new buffer.
    ///
    /// # Example
    ///
    /// ```
    /// use pipebuf_io::{ChannelSource, SourceExt};
    ///
    /// let mut source = ChannelSource::new(&b"Hello, world!"[..]);
    ///
    /// let hello = source.read_exactly(5).unwrap();
    /// assert_eq!(hello.to_vec(), b"Hello");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an [`Error::Io`] of kind [`ErrorKind::UnexpectedEof`] if the stream ends first.
    /// Any other error of the source is forwarded.
    fn read_exactly(&mut self, byte_count: usize) -> Result<Buffer>;

    /// Reads until the end of the stream, returning everything that was read.
    ///
    /// # Errors
    ///
    /// Any error of the source is forwarded.
    fn read_to_end(&mut self) -> Result<Buffer>;

    /// Moves every remaining byte of the stream into `sink`, returning the number of bytes moved.
    ///
    /// The sink is neither flushed nor closed.
    ///
    /// # Errors
    ///
    /// Any error of the source or the sink is forwarded.
    fn copy_to<S: Sink + ?Sized>(&mut self, sink: &mut S) -> Result<u64>;
}

impl<T> SourceExt for T
where
    T: Source + ?Sized,
{
    fn read_exactly(&mut self, byte_count: usize) -> Result<Buffer> {
        let mut buffer = Buffer::new();

        while buffer.len() < byte_count {
            let wanted = byte_count - buffer.len();

            if self.read(&mut buffer, wanted)?.is_none() {
                return Err(Error::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("stream ended after {} of {byte_count} bytes", buffer.len()),
                )));
            }
        }

        Ok(buffer)
    }

    fn read_to_end(&mut self) -> Result<Buffer> {
        let mut buffer = Buffer::new();

        while self.read(&mut buffer, SEGMENT_SIZE)?.is_some() {}

        Ok(buffer)
    }

    fn copy_to<S: Sink + ?Sized>(&mut self, sink: &mut S) -> Result<u64> {
        let mut buffer = Buffer::new();
        let mut total: u64 = 0;

        while let Some(count) = self.read(&mut buffer, SEGMENT_SIZE)? {
            sink.write(&mut buffer, count)?;
            total += count as u64;
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use new_zealand::nz;

    use super::*;
    use crate::testing::{FakeSink, FakeSource};

    #[test]
    fn read_exactly_spans_short_reads() {
        let mut source = FakeSource::builder()
            .contents(b"0123456789".to_vec())
            .max_read_size(nz!(3))
            .build();

        let first = source.read_exactly(7).unwrap();
        assert_eq!(first.to_vec(), b"0123456");

        let rest = source.read_exactly(3).unwrap();
        assert_eq!(rest.to_vec(), b"789");
    }

    #[test]
    fn read_exactly_fails_on_early_end() {
        let mut source = FakeSource::new(b"abc".to_vec());

        let error = source.read_exactly(4).unwrap_err();
        assert!(matches!(error, Error::Io(ref e) if e.kind() == ErrorKind::UnexpectedEof));
    }

    #[test]
    fn read_exactly_zero() {
        let mut source = FakeSource::new(Vec::<u8>::new());
        assert!(source.read_exactly(0).unwrap().is_empty());
    }

    #[test]
    fn read_to_end_collects_everything() {
        let payload: Vec<u8> = (0..20_000_u32).map(|i| (i % 251) as u8).collect();
        let mut source = FakeSource::builder()
            .contents(payload.clone())
            .max_read_size(nz!(1000))
            .build();

        assert_eq!(source.read_to_end().unwrap().to_vec(), payload);

        // The stream stays ended.
        assert!(source.read_to_end().unwrap().is_empty());
    }

    #[test]
    fn copy_to_moves_all_bytes() {
        let mut source = FakeSource::builder()
            .contents(b"Hello, world!".to_vec())
            .max_read_size(nz!(4))
            .build();
        let mut sink = FakeSink::new();

        assert_eq!(source.copy_to(&mut sink).unwrap(), 13);
        assert_eq!(sink.contents(), b"Hello, world!");
        assert_eq!(sink.write_sizes(), &[4, 4, 4, 1]);
        assert_eq!(sink.flush_count(), 0);
    }
}

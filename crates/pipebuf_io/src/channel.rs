// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::io::{ErrorKind, Read, Write};

use pipebuf::Buffer;

use crate::{Error, Result, Sink, Source, Timeout, check_read_request, check_write_request};

/// A [`Source`] that pulls bytes from any [`std::io::Read`] channel.
///
/// Bytes are read straight into the spare capacity of the destination buffer, so no
/// intermediate copy is made. Interrupted reads are retried. The first read that reports end of
/// stream latches the source into the ended state; the channel is not consulted again after
/// that.
///
/// # Examples
///
/// ```
/// use pipebuf::Buffer;
/// use pipebuf_io::{ChannelSource, Source};
///
/// let mut source = ChannelSource::new(&b"abc"[..]);
/// let mut buffer = Buffer::new();
///
/// assert_eq!(source.read(&mut buffer, 2).unwrap(), Some(2));
/// assert_eq!(source.read(&mut buffer, 2).unwrap(), Some(1));
/// assert_eq!(source.read(&mut buffer, 2).unwrap(), None);
///
/// assert_eq!(buffer.to_vec(), b"abc");
/// ```
pub struct ChannelSource<R> {
    channel: Option<R>,
    timeout: Timeout,
    ended: bool,
}

impl<R: Read> ChannelSource<R> {
    /// Wraps `channel` with no timeout.
    #[must_use]
    pub fn new(channel: R) -> Self {
        Self {
            channel: Some(channel),
            timeout: Timeout::none(),
            ended: false,
        }
    }

    /// Replaces the timeout policy.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the timeout policy of a source that is already in use.
    pub fn set_timeout(&mut self, timeout: Timeout) {
        self.timeout = timeout;
    }

    /// Returns the wrapped channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClosedResource`] if the source has been closed.
    pub fn into_inner(self) -> Result<R> {
        self.channel.ok_or(Error::ClosedResource)
    }
}

impl<R: Read> Source for ChannelSource<R> {
    fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>> {
        check_read_request(byte_count)?;
        let channel = self.channel.as_mut().ok_or(Error::ClosedResource)?;

        if byte_count == 0 {
            return Ok(Some(0));
        }

        if self.ended {
            return Ok(None);
        }

        let deadline = self.timeout.start();

        loop {
            deadline.check()?;

            match sink.write_with(byte_count, |cursor| channel.read(cursor.as_mut_slice())) {
                Ok(0) => {
                    self.ended = true;
                    return Ok(None);
                }
                Ok(count) => return Ok(Some(count)),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn timeout(&self) -> &Timeout {
        &self.timeout
    }

    fn close(&mut self) -> Result<()> {
        if self.channel.take().is_some() {
            tracing::event!(name: "pipebuf.channel.close", tracing::Level::DEBUG, channel.direction = "read", "channel closed");
        }

        Ok(())
    }
}

impl<R> fmt::Debug for ChannelSource<R> {
    #[cfg_attr(test, mutants::skip)] // We have no API contract for this.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSource")
            .field("closed", &self.channel.is_none())
            .field("ended", &self.ended)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A [`Sink`] that pushes bytes into any [`std::io::Write`] channel.
///
/// Bytes are handed to the channel straight from the segments of the source buffer. A write loops
/// until every requested byte has been accepted, checking the deadline before each attempt.
/// Interrupted writes are retried; a channel that accepts zero bytes fails the write with
/// [`ErrorKind::WriteZero`].
///
/// Closing the sink flushes the channel, then drops it.
pub struct ChannelSink<W> {
    channel: Option<W>,
    timeout: Timeout,
}

impl<W: Write> ChannelSink<W> {
    /// Wraps `channel` with no timeout.
    #[must_use]
    pub fn new(channel: W) -> Self {
        Self {
            channel: Some(channel),
            timeout: Timeout::none(),
        }
    }

    /// Replaces the timeout policy.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the timeout policy of a sink that is already in use.
    pub fn set_timeout(&mut self, timeout: Timeout) {
        self.timeout = timeout;
    }

    /// Whether [`close()`][Sink::close] has released the channel.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.channel.is_none()
    }

    /// Returns the wrapped channel without flushing it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClosedResource`] if the sink has been closed.
    pub fn into_inner(self) -> Result<W> {
        self.channel.ok_or(Error::ClosedResource)
    }
}

impl<W: Write> Sink for ChannelSink<W> {
    fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<()> {
        check_write_request(source, byte_count)?;
        let channel = self.channel.as_mut().ok_or(Error::ClosedResource)?;

        let deadline = self.timeout.start();
        let mut remaining = byte_count;

        while remaining > 0 {
            deadline.check()?;

            let outcome = source.read_with(|chunk| {
                let len = chunk.len().min(remaining);
                channel.write(&chunk[..len])
            });

            match outcome {
                Ok(0) => return Err(std::io::Error::new(ErrorKind::WriteZero, "channel accepted no bytes").into()),
                Ok(count) => remaining -= count,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(Error::ClosedResource)?;

        self.timeout.start().check()?;
        channel.flush()?;
        Ok(())
    }

    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn timeout(&self) -> &Timeout {
        &self.timeout
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut channel) = self.channel.take() else {
            return Ok(());
        };

        tracing::event!(name: "pipebuf.channel.close", tracing::Level::DEBUG, channel.direction = "write", "channel closed");

        channel.flush()?;
        Ok(())
    }
}

impl<W> fmt::Debug for ChannelSink<W> {
    #[cfg_attr(test, mutants::skip)] // We have no API contract for this.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSink")
            .field("closed", &self.channel.is_none())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::{Read, Write};
use std::num::NonZero;
use std::time::Duration;

/// An in-memory [`std::io::Read`] and [`std::io::Write`] channel that sleeps on every call and
/// transfers only a few bytes at a time.
///
/// Use it behind a [`ChannelSource`][crate::ChannelSource] or [`ChannelSink`][crate::ChannelSink]
/// to exercise short transfers and timeouts.
///
/// This is for test and example purposes only.
#[derive(Debug)]
pub struct SlowChannel {
    readable: Vec<u8>,
    read_position: usize,
    written: Vec<u8>,
    delay: Duration,
    max_transfer: Option<NonZero<usize>>,
}

impl SlowChannel {
    /// Starts building a new `SlowChannel`.
    #[must_use]
    pub fn builder() -> SlowChannelBuilder {
        SlowChannelBuilder {
            readable: Vec::new(),
            delay: Duration::ZERO,
            max_transfer: None,
        }
    }

    /// The bytes written into the channel so far.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    fn transfer_limit(&self, requested: usize) -> usize {
        requested.min(self.max_transfer.map_or(usize::MAX, NonZero::get))
    }
}

impl Read for SlowChannel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::thread::sleep(self.delay);

        let remaining = &self.readable[self.read_position..];
        let count = self.transfer_limit(buf.len()).min(remaining.len());

        buf[..count].copy_from_slice(&remaining[..count]);
        self.read_position += count;
        Ok(count)
    }
}

impl Write for SlowChannel {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::thread::sleep(self.delay);

        let count = self.transfer_limit(buf.len());
        self.written.extend_from_slice(&buf[..count]);
        Ok(count)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Creates an instance of [`SlowChannel`].
///
/// Access through [`SlowChannel::builder()`][SlowChannel::builder].
#[derive(Debug)]
pub struct SlowChannelBuilder {
    readable: Vec<u8>,
    delay: Duration,
    max_transfer: Option<NonZero<usize>>,
}

impl SlowChannelBuilder {
    /// The data returned by reads from the channel.
    ///
    /// Optional. Defaults to an empty stream.
    #[must_use]
    pub fn contents(mut self, contents: impl Into<Vec<u8>>) -> Self {
        self.readable = contents.into();
        self
    }

    /// How long every read and write sleeps before transferring anything.
    ///
    /// Optional. Defaults to no delay.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The maximum number of bytes transferred by a single read or write.
    ///
    /// Optional. Defaults to no limit.
    #[must_use]
    pub fn max_transfer(mut self, max_transfer: NonZero<usize>) -> Self {
        self.max_transfer = Some(max_transfer);
        self
    }

    /// Builds the `SlowChannel` with the provided configuration.
    #[must_use]
    pub fn build(self) -> SlowChannel {
        SlowChannel {
            readable: self.readable,
            read_position: 0,
            written: Vec::new(),
            delay: self.delay,
            max_transfer: self.max_transfer,
        }
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

use ::base64::Engine;
use ::base64::engine::Config;
use ::base64::engine::general_purpose::{GeneralPurpose, STANDARD, URL_SAFE};
use pipebuf::{Buffer, SEGMENT_SIZE};
use pipebuf_io::{Error, Result, Sink, Timeout, check_write_request};

use super::{BASE64_BLOCK, DECODED_BLOCK};

// Input bytes per encode step, sized so one step fills exactly one buffer segment.
const ENCODE_CHUNK: usize = SEGMENT_SIZE / BASE64_BLOCK * DECODED_BLOCK;

/// A [`Sink`] decorator that Base64-encodes everything written to it.
///
/// Only whole 3-byte groups are encoded as they arrive; the 1 or 2 bytes left over from a write
/// are carried into the next one. The output is therefore identical to encoding the whole payload
/// at once, however the writes are split. The padded tail is emitted by [`finish()`][Self::finish]
/// or [`close()`][Sink::close]. [`flush()`][Sink::flush] forwards complete groups only.
///
/// A sink created with [`segmented()`][Self::segmented] instead encodes and pads each write on
/// its own, producing a concatenation of independently padded segments.
/// [`Base64Source`][crate::Base64Source] decodes either form.
///
/// If the wrapped sink fails part way through, for example with [`Error::TimedOut`], the encoded
/// bytes it did not accept stay in this sink and are sent first by the next write, flush, finish
/// or close. Dropping the sink while it still holds bytes logs a warning; use
/// [`close()`][Sink::close] to end the stream.
///
/// # Examples
///
/// ```
/// use pipebuf_codec::Base64Sink;
/// use pipebuf_io::SinkExt;
/// use pipebuf_io::testing::FakeSink;
///
/// let mut sink = Base64Sink::new(FakeSink::new());
/// sink.write_slice(b"ab").unwrap();
/// sink.write_slice(b"cd").unwrap();
/// sink.finish().unwrap();
///
/// assert_eq!(sink.inner().contents(), b"YWJjZA==");
/// ```
#[derive(Debug)]
pub struct Base64Sink<S, E = GeneralPurpose> {
    inner: S,
    engine: E,
    backlog: Backlog,
    segmented: bool,
    closed: bool,
}

/// Bytes accepted from callers that the wrapped sink has not received yet.
#[derive(Debug)]
struct Backlog {
    // At most DECODED_BLOCK - 1 bytes waiting for the rest of their group.
    pending: Vec<u8>,

    // Encoded bytes the wrapped sink did not accept.
    unsent: Buffer,
}

impl Backlog {
    fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.unsent.is_empty()
    }
}

impl Drop for Backlog {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }

        tracing::event!(
            name: "pipebuf.base64.dropped",
            tracing::Level::WARN,
            base64.pending_bytes = self.pending.len(),
            base64.unsent_bytes = self.unsent.len(),
            "Base64 sink dropped with undelivered bytes"
        );
    }
}

impl<S: Sink> Base64Sink<S> {
    /// Encodes into `inner` with the standard padded alphabet.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self::with_engine(inner, STANDARD)
    }

    /// Encodes into `inner` with the URL-safe padded alphabet.
    #[must_use]
    pub fn url_safe(inner: S) -> Self {
        Self::with_engine(inner, URL_SAFE)
    }
}

impl<S: Sink, E: Engine + Debug> Base64Sink<S, E> {
    /// Encodes into `inner` with any Base64 engine.
    #[must_use]
    pub fn with_engine(inner: S, engine: E) -> Self {
        Self {
            inner,
            engine,
            backlog: Backlog {
                pending: Vec::with_capacity(DECODED_BLOCK),
                unsent: Buffer::new(),
            },
            segmented: false,
            closed: false,
        }
    }

    /// Switches to encoding (and padding) every write independently.
    #[must_use]
    pub fn segmented(mut self) -> Self {
        self.segmented = true;
        self
    }

    /// The wrapped sink.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// The wrapped sink, for adjusting it between writes (e.g. its timeout).
    #[must_use]
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Returns the wrapped sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedStream`] if the sink still holds bytes that did not reach the
    /// wrapped sink, either an unpadded tail or output it did not accept. Call
    /// [`finish()`][Self::finish] or [`close()`][Sink::close] first.
    pub fn into_inner(self) -> Result<S> {
        if !self.backlog.is_empty() {
            return Err(Error::MalformedStream(format!(
                "{} unencoded and {} encoded bytes were not delivered",
                self.backlog.pending.len(),
                self.backlog.unsent.len()
            )));
        }

        Ok(self.inner)
    }

    /// Encodes the trailing partial group with padding and forwards it, without closing.
    ///
    /// Further writes start a new padded segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClosedResource`] if the sink has been closed, or any error of the wrapped
    /// sink. After a retryable error the undelivered output is kept and `finish()` can be retried.
    pub fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedResource);
        }

        self.emit_tail()
    }

    fn emit_tail(&mut self) -> Result<()> {
        self.forward_unsent()?;

        if self.backlog.pending.is_empty() {
            return Ok(());
        }

        let tail = std::mem::take(&mut self.backlog.pending);

        tracing::event!(
            name: "pipebuf.base64.tail",
            tracing::Level::DEBUG,
            base64.tail_bytes = tail.len(),
            "encoding padded tail"
        );

        self.encode(&tail)?;
        self.forward_unsent()
    }

    /// Appends the encoding of `input` to the unsent backlog.
    fn encode(&mut self, input: &[u8]) -> Result<()> {
        let engine = &self.engine;
        let padding = engine.config().encode_padding();

        for chunk in input.chunks(ENCODE_CHUNK) {
            let encoded_len = ::base64::encoded_len(chunk.len(), padding)
                .ok_or_else(|| Error::InvalidArgument(format!("cannot encode {} bytes", chunk.len())))?;

            self.backlog.unsent.write_with(encoded_len, |cursor| {
                engine
                    .encode_slice(chunk, cursor.as_mut_slice())
                    .map_err(|error| Error::InvalidArgument(error.to_string()))
            })?;
        }

        Ok(())
    }

    fn forward_unsent(&mut self) -> Result<()> {
        let len = self.backlog.unsent.len();
        if len == 0 {
            return Ok(());
        }

        self.inner.write(&mut self.backlog.unsent, len)
    }
}

impl<S: Sink, E: Engine + Debug> Sink for Base64Sink<S, E> {
    fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<()> {
        check_write_request(source, byte_count)?;

        if self.closed {
            return Err(Error::ClosedResource);
        }

        // Earlier output goes first; if it still cannot be delivered, `source` stays untouched.
        self.forward_unsent()?;

        let mut raw = std::mem::take(&mut self.backlog.pending);
        raw.extend(source.consume_to_vec(byte_count));

        if !self.segmented {
            let aligned = raw.len() / DECODED_BLOCK * DECODED_BLOCK;
            self.backlog.pending = raw.split_off(aligned);
        }

        self.encode(&raw)?;
        self.forward_unsent()
    }

    fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedResource);
        }

        self.forward_unsent()?;
        self.inner.flush()
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn timeout(&self) -> &Timeout {
        self.inner.timeout()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        let tail = self.emit_tail();
        if matches!(&tail, Err(error) if error.is_retryable()) {
            return tail;
        }

        let closed = self.inner.close();
        if tail.is_ok() && matches!(&closed, Err(error) if error.is_retryable()) {
            return closed;
        }

        self.closed = true;
        tail.and(closed)
    }
}

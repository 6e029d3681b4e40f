// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

use ::base64::Engine;
use ::base64::engine::general_purpose::{GeneralPurpose, STANDARD, URL_SAFE};
use pipebuf::Buffer;
use pipebuf_io::{Error, MAX_REQUEST_LENGTH, Result, Source, Timeout};

use super::{BASE64_BLOCK, DECODED_BLOCK, decode_quanta};

/// A [`Source`] decorator that decodes a Base64 stream read from the wrapped source.
///
/// Encoded bytes are pulled from upstream into a holding buffer, and only the longest prefix made
/// of whole 4-byte quanta is decoded. The remaining 1-3 bytes wait for the next upstream read.
/// Decoded bytes that exceed a read request are kept for the next call, which then returns
/// without touching the upstream source at all.
///
/// A stream made of several independently padded segments (as written by
/// [`Base64Sink::segmented()`][crate::Base64Sink::segmented]) decodes to the concatenation of
/// the segments.
///
/// Invalid symbols, and encoded bytes left over when the upstream source ends, fail the read with
/// [`Error::MalformedStream`]. The source refuses every read after that.
///
/// # Examples
///
/// ```
/// use pipebuf::Buffer;
/// use pipebuf_codec::Base64Source;
/// use pipebuf_io::Source;
/// use pipebuf_io::testing::FakeSource;
///
/// let mut source = Base64Source::new(FakeSource::new(b"YWJj"));
/// let mut decoded = Buffer::new();
///
/// assert_eq!(source.read(&mut decoded, 1).unwrap(), Some(1));
/// assert_eq!(source.read(&mut decoded, 2).unwrap(), Some(2));
/// assert_eq!(source.read(&mut decoded, 2).unwrap(), None);
///
/// assert_eq!(decoded.to_vec(), b"abc");
/// ```
#[derive(Debug)]
pub struct Base64Source<S, E = GeneralPurpose> {
    inner: S,
    engine: E,

    // Encoded bytes read from upstream that do not yet form a whole quantum.
    source_buffer: Buffer,

    // Decoded bytes not yet handed to a caller.
    decoded_buffer: Buffer,

    exhausted: bool,
    malformed: bool,
    closed: bool,
}

impl<S: Source> Base64Source<S> {
    /// Decodes from `inner` with the standard padded alphabet.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self::with_engine(inner, STANDARD)
    }

    /// Decodes from `inner` with the URL-safe padded alphabet.
    #[must_use]
    pub fn url_safe(inner: S) -> Self {
        Self::with_engine(inner, URL_SAFE)
    }
}

impl<S: Source, E: Engine + Debug> Base64Source<S, E> {
    /// Decodes from `inner` with any Base64 engine.
    #[must_use]
    pub fn with_engine(inner: S, engine: E) -> Self {
        Self {
            inner,
            engine,
            source_buffer: Buffer::new(),
            decoded_buffer: Buffer::new(),
            exhausted: false,
            malformed: false,
            closed: false,
        }
    }

    /// The wrapped source.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the wrapped source. Bytes that were read but not yet returned are discarded.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Pulls from upstream until `byte_count` decoded bytes are available or upstream has ended.
    fn fill(&mut self, byte_count: usize) -> Result<()> {
        while self.decoded_buffer.len() < byte_count && !self.exhausted {
            let missing = byte_count - self.decoded_buffer.len();
            let request = missing
                .div_ceil(DECODED_BLOCK)
                .saturating_mul(BASE64_BLOCK)
                .min(MAX_REQUEST_LENGTH);

            if self.inner.read(&mut self.source_buffer, request)?.is_none() {
                self.exhausted = true;

                if !self.source_buffer.is_empty() {
                    return Err(self.malformed(format!(
                        "{} trailing bytes do not form a Base64 quantum",
                        self.source_buffer.len()
                    )));
                }

                break;
            }

            let aligned = self.source_buffer.len() / BASE64_BLOCK * BASE64_BLOCK;
            if aligned == 0 {
                continue;
            }

            let encoded = self.source_buffer.consume_to_vec(aligned);
            if let Err(error) = decode_quanta(&self.engine, &encoded, &mut self.decoded_buffer) {
                return Err(self.malformed(format!("invalid Base64: {error}")));
            }
        }

        Ok(())
    }

    fn malformed(&mut self, reason: String) -> Error {
        self.malformed = true;

        tracing::event!(
            name: "pipebuf.base64.malformed",
            tracing::Level::WARN,
            base64.reason = %reason,
            "malformed Base64 stream"
        );

        Error::MalformedStream(reason)
    }
}

impl<S: Source, E: Engine + Debug> Source for Base64Source<S, E> {
    fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>> {
        if byte_count >= MAX_REQUEST_LENGTH {
            return Err(Error::InvalidArgument(format!(
                "byte count {byte_count} must be below {MAX_REQUEST_LENGTH}"
            )));
        }

        if self.closed {
            return Err(Error::ClosedResource);
        }

        if self.malformed {
            return Err(Error::MalformedStream("the stream was previously found to be malformed".to_string()));
        }

        if byte_count == 0 {
            return Ok(Some(0));
        }

        if self.decoded_buffer.len() < byte_count {
            self.fill(byte_count)?;
        }

        if self.decoded_buffer.is_empty() {
            return Ok(None);
        }

        let count = byte_count.min(self.decoded_buffer.len());
        sink.move_from(&mut self.decoded_buffer, count);
        Ok(Some(count))
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn timeout(&self) -> &Timeout {
        self.inner.timeout()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.closed = true;
        self.source_buffer.clear();
        self.decoded_buffer.clear();
        self.inner.close()
    }
}

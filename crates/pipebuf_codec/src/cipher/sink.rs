// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use pipebuf::Buffer;
use pipebuf_io::{Error, Result, Sink, Timeout, check_write_request};

use super::Cipher;

/// A [`Sink`] decorator that passes everything written to it through a [`Cipher`].
///
/// Each write feeds its whole byte range to [`Cipher::update()`] in one call and forwards
/// whatever output the cipher produced. The cipher does its own block buffering, so writes of any
/// size are accepted.
///
/// [`flush()`][Sink::flush] finalizes the cipher and forwards the final block; it ends the
/// encrypted stream, so a later write or flush fails with [`Error::MalformedStream`].
/// [`close()`][Sink::close] finalizes first if that has not happened yet.
///
/// Cipher output the wrapped sink did not accept, for example because it timed out, stays in this
/// sink and is sent before anything else by the next write, flush or close. Dropping the sink
/// before the cipher is finalized and its output delivered logs a warning.
///
/// # Examples
///
/// ```
/// use pipebuf_codec::{Aes128CbcEncryptor, CipherSink};
/// use pipebuf_io::testing::FakeSink;
/// use pipebuf_io::{Sink, SinkExt};
///
/// let cipher = Aes128CbcEncryptor::new(&[7; 16], &[0; 16])?;
/// let mut sink = CipherSink::new(FakeSink::new(), cipher);
///
/// sink.write_slice(b"attack at dawn")?;
/// sink.close()?;
///
/// assert_eq!(sink.inner().contents().len(), 16);
/// # Ok::<(), pipebuf_io::Error>(())
/// ```
#[derive(Debug)]
pub struct CipherSink<S, C: Cipher> {
    inner: S,
    state: CipherState<C>,
    flushed: bool,
    closed: bool,
}

/// The cipher together with output of it that the wrapped sink has not received yet.
#[derive(Debug)]
struct CipherState<C: Cipher> {
    cipher: C,
    unsent: Buffer,
}

impl<C: Cipher> CipherState<C> {
    fn is_settled(&self) -> bool {
        self.cipher.is_finalized() && self.unsent.is_empty()
    }
}

impl<C: Cipher> Drop for CipherState<C> {
    fn drop(&mut self) {
        if self.is_settled() {
            return;
        }

        tracing::event!(
            name: "pipebuf.cipher.dropped",
            tracing::Level::WARN,
            cipher.finalized = self.cipher.is_finalized(),
            cipher.unsent_bytes = self.unsent.len(),
            "cipher sink dropped before its output was delivered"
        );
    }
}

impl<S: Sink, C: Cipher> CipherSink<S, C> {
    /// Encrypts (or decrypts) into `inner` with `cipher`.
    #[must_use]
    pub fn new(inner: S, cipher: C) -> Self {
        Self {
            inner,
            state: CipherState {
                cipher,
                unsent: Buffer::new(),
            },
            flushed: false,
            closed: false,
        }
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
    /// Returns [`Error::MalformedStream`] if the cipher has not been finalized or some of its
    /// output did not reach the wrapped sink. Call [`flush()`][Sink::flush] first.
    pub fn into_inner(self) -> Result<S> {
        if !self.state.cipher.is_finalized() {
            return Err(Error::MalformedStream("the cipher has not been finalized".to_string()));
        }

        if !self.state.unsent.is_empty() {
            return Err(Error::MalformedStream(format!(
                "{} bytes of cipher output were not delivered",
                self.state.unsent.len()
            )));
        }

        Ok(self.inner)
    }

    /// Delivers earlier output, then finalizes the cipher unless that already happened.
    fn finalize_and_forward(&mut self) -> Result<()> {
        self.forward_unsent()?;

        if self.state.cipher.is_finalized() {
            return Ok(());
        }

        self.inner.timeout().start().check()?;

        let output = self.state.cipher.finalize()?;

        tracing::event!(
            name: "pipebuf.cipher.finalize",
            tracing::Level::DEBUG,
            cipher.final_bytes = output.len(),
            "cipher finalized"
        );

        self.state.unsent.put_slice(&output);
        self.forward_unsent()
    }

    fn forward_unsent(&mut self) -> Result<()> {
        let len = self.state.unsent.len();
        if len == 0 {
            return Ok(());
        }

        self.inner.write(&mut self.state.unsent, len)
    }
}

impl<S: Sink, C: Cipher> Sink for CipherSink<S, C> {
    fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<()> {
        check_write_request(source, byte_count)?;

        if self.closed {
            return Err(Error::ClosedResource);
        }

        if self.state.cipher.is_finalized() {
            return Err(Error::MalformedStream("cannot write after the cipher was finalized".to_string()));
        }

        // Earlier output goes first; if it still cannot be delivered, `source` stays untouched.
        self.forward_unsent()?;

        let input = source.consume_to_vec(byte_count);
        let output = self.state.cipher.update(&input)?;
        self.state.unsent.put_slice(&output);

        self.forward_unsent()
    }

    fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedResource);
        }

        if self.flushed {
            return Err(Error::MalformedStream("the cipher stream was already flushed".to_string()));
        }

        self.finalize_and_forward()?;
        self.inner.flush()?;

        self.flushed = true;
        Ok(())
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn timeout(&self) -> &Timeout {
        self.inner.timeout()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        let finalized = self.finalize_and_forward();
        if matches!(&finalized, Err(error) if error.is_retryable()) {
            return finalized;
        }

        let closed = self.inner.close();
        if finalized.is_ok() && matches!(&closed, Err(error) if error.is_retryable()) {
            return closed;
        }

        self.closed = true;
        finalized.and(closed)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZero;
    use std::time::Duration;

    use ::cbc::cipher::block_padding::Pkcs7;
    use ::cbc::cipher::{BlockEncryptMut, KeyIvInit};
    use pipebuf_io::testing::{FakeSink, LogCapture, SlowChannel};
    use pipebuf_io::{ChannelSink, SinkExt};
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::Aes128CbcEncryptor;

    const KEY: [u8; 16] = *b"0123456789abcdef";
    const IV: [u8; 16] = *b"fedcba9876543210";

    fn encryptor() -> Aes128CbcEncryptor {
        Aes128CbcEncryptor::new(&KEY, &IV).unwrap()
    }

    fn reference_encrypt(plaintext: &[u8]) -> Vec<u8> {
        ::cbc::Encryptor::<aes::Aes128>::new_from_slices(&KEY, &IV)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    #[test]
    fn thread_safe_type() {
        assert_impl_all!(CipherSink<FakeSink, Aes128CbcEncryptor>: Send, Sync);
    }

    #[test]
    fn split_writes_match_reference() {
        let plaintext: Vec<u8> = (0..=200_u8).collect();

        let mut sink = CipherSink::new(FakeSink::new(), encryptor());
        for piece in plaintext.chunks(13) {
            sink.write_slice(piece).unwrap();
        }
        sink.close().unwrap();

        assert_eq!(sink.inner().contents(), reference_encrypt(&plaintext));
    }

    #[test]
    fn only_whole_blocks_are_forwarded_before_finalize() {
        let mut sink = CipherSink::new(FakeSink::new(), encryptor());

        sink.write_slice(&[1; 10]).unwrap();
        assert!(sink.inner().contents().is_empty());

        sink.write_slice(&[1; 10]).unwrap();
        assert_eq!(sink.inner().contents().len(), 16);
    }

    #[test]
    fn empty_payload_emits_padding_block() {
        let mut sink = CipherSink::new(FakeSink::new(), encryptor());
        sink.close().unwrap();

        assert_eq!(sink.inner().contents(), reference_encrypt(b""));
        assert_eq!(sink.inner().contents().len(), 16);
    }

    #[test]
    fn flush_finalizes_once() {
        let mut sink = CipherSink::new(FakeSink::new(), encryptor());
        sink.write_slice(b"hello").unwrap();
        sink.flush().unwrap();

        assert_eq!(sink.inner().contents(), reference_encrypt(b"hello"));
        assert_eq!(sink.inner().flush_count(), 1);

        assert!(matches!(sink.flush(), Err(Error::MalformedStream(_))));
        assert!(matches!(sink.write_slice(b"more"), Err(Error::MalformedStream(_))));

        // Closing does not finalize a second time.
        sink.close().unwrap();
        assert_eq!(sink.inner().contents().len(), 16);
        assert_eq!(sink.inner().close_count(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let mut sink = CipherSink::new(FakeSink::new(), encryptor());
        sink.close().unwrap();
        sink.close().unwrap();

        assert_eq!(sink.inner().close_count(), 1);
        assert!(matches!(sink.write_slice(b"a"), Err(Error::ClosedResource)));
        assert!(matches!(sink.flush(), Err(Error::ClosedResource)));
    }

    #[test]
    fn expired_timeout_defers_finalize() {
        let mut channel = SlowChannel::builder().build();
        let mut sink = CipherSink::new(ChannelSink::new(&mut channel), encryptor());
        sink.write_slice(b"abc").unwrap();

        sink.inner_mut().set_timeout(Timeout::after(Duration::ZERO));
        assert!(matches!(sink.close(), Err(Error::TimedOut { .. })));
        assert!(!sink.inner().is_closed());
        assert!(!sink.state.cipher.is_finalized());

        sink.inner_mut().set_timeout(Timeout::none());
        sink.close().unwrap();
        assert!(sink.inner().is_closed());
        drop(sink);

        assert_eq!(channel.written(), reference_encrypt(b"abc"));
    }

    #[test]
    fn timed_out_output_is_delivered_on_retry() {
        let payload: Vec<u8> = (0..40_u8).collect();
        let channel = SlowChannel::builder()
            .delay(Duration::from_millis(5))
            .max_transfer(NonZero::new(1).unwrap())
            .build();
        let inner = ChannelSink::new(channel).with_timeout(Timeout::after(Duration::from_millis(20)));
        let mut sink = CipherSink::new(inner, encryptor());

        let error = sink.write_slice(&payload).unwrap_err();
        assert!(error.is_retryable());
        assert!(!sink.state.unsent.is_empty());

        sink.inner_mut().set_timeout(Timeout::none());

        // The next write delivers the held-back blocks before its own output.
        sink.write_slice(b"!").unwrap();
        sink.flush().unwrap();

        let channel = sink.into_inner().unwrap().into_inner().unwrap();
        let mut expected = payload;
        expected.push(b'!');
        assert_eq!(channel.written(), reference_encrypt(&expected));
    }

    #[test]
    fn timed_out_flush_can_be_retried() {
        let mut channel = SlowChannel::builder()
            .delay(Duration::from_millis(5))
            .max_transfer(NonZero::new(1).unwrap())
            .build();
        let inner = ChannelSink::new(&mut channel).with_timeout(Timeout::after(Duration::from_millis(20)));
        let mut sink = CipherSink::new(inner, encryptor());
        sink.write_slice(b"hello").unwrap();

        assert!(matches!(sink.flush(), Err(Error::TimedOut { .. })));
        assert!(sink.state.cipher.is_finalized());

        sink.inner_mut().set_timeout(Timeout::none());
        sink.flush().unwrap();
        assert!(matches!(sink.flush(), Err(Error::MalformedStream(_))));

        sink.close().unwrap();
        drop(sink);

        assert_eq!(channel.written(), reference_encrypt(b"hello"));
    }

    #[test]
    fn into_inner_requires_finalized_cipher() {
        let mut sink = CipherSink::new(FakeSink::new(), encryptor());
        sink.write_slice(b"hello").unwrap();

        assert!(matches!(sink.into_inner(), Err(Error::MalformedStream(_))));

        let mut sink = CipherSink::new(FakeSink::new(), encryptor());
        sink.write_slice(b"hello").unwrap();
        sink.flush().unwrap();

        assert_eq!(sink.into_inner().unwrap().contents(), reference_encrypt(b"hello"));
    }

    #[test]
    fn dropping_unfinalized_sink_warns() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let mut sink = CipherSink::new(FakeSink::new(), encryptor());
        sink.write_slice(b"hello").unwrap();
        drop(sink);

        capture.assert_contains("cipher sink dropped before its output was delivered");
        capture.assert_contains("cipher.finalized=false");
    }

    #[test]
    fn dropping_after_close_is_silent() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let mut sink = CipherSink::new(FakeSink::new(), encryptor());
        sink.write_slice(b"hello").unwrap();
        sink.close().unwrap();
        drop(sink);

        assert!(!capture.output().contains("dropped"));
    }

    #[test]
    fn finalize_is_logged() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let mut sink = CipherSink::new(FakeSink::new(), encryptor());
        sink.write_slice(b"abc").unwrap();
        sink.close().unwrap();

        capture.assert_contains("cipher finalized");
        capture.assert_contains("cipher.final_bytes=16");
    }
}

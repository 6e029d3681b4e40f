// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use pipebuf::Buffer;
use pipebuf_io::{Error, Result, Source, Timeout, check_read_request};

use super::Cipher;

/// A [`Source`] decorator that passes everything read from the wrapped source through a
/// [`Cipher`].
///
/// Upstream reads ask for at least one cipher block. Output the cipher produces beyond the current
/// request is kept for the next read. When the wrapped source reports end of stream the cipher is
/// finalized exactly once and its final output (for a decryptor, the unpadded last block) is
/// returned before this source reports end of stream itself.
///
/// A cipher failure, such as invalid padding, fails the read with [`Error::MalformedStream`] and
/// the source refuses every read after that. A timeout before finalizing can be retried.
///
/// # Examples
///
/// ```
/// use pipebuf_codec::{Aes128CbcDecryptor, Aes128CbcEncryptor, Cipher, CipherSource};
/// use pipebuf_io::SourceExt;
/// use pipebuf_io::testing::FakeSource;
///
/// let mut encryptor = Aes128CbcEncryptor::new(&[7; 16], &[0; 16])?;
/// let mut ciphertext = encryptor.update(b"attack at dawn")?;
/// ciphertext.extend(encryptor.finalize()?);
///
/// let decryptor = Aes128CbcDecryptor::new(&[7; 16], &[0; 16])?;
/// let mut source = CipherSource::new(FakeSource::new(ciphertext), decryptor);
///
/// assert_eq!(source.read_to_end()?.to_vec(), b"attack at dawn");
/// # Ok::<(), pipebuf_io::Error>(())
/// ```
#[derive(Debug)]
pub struct CipherSource<S, C> {
    inner: S,
    cipher: C,

    // Cipher output not yet handed to a caller.
    output: Buffer,

    poisoned: bool,
    closed: bool,
}

impl<S: Source, C: Cipher> CipherSource<S, C> {
    /// Decrypts (or encrypts) what is read from `inner` with `cipher`.
    #[must_use]
    pub fn new(inner: S, cipher: C) -> Self {
        Self {
            inner,
            cipher,
            output: Buffer::new(),
            poisoned: false,
            closed: false,
        }
    }

    /// The wrapped source.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the wrapped source. Output that was not yet returned is discarded.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Pulls one upstream chunk through the cipher, or finalizes it if upstream has ended.
    fn pull(&mut self, byte_count: usize) -> Result<()> {
        let missing = byte_count.saturating_sub(self.output.len());
        let request = missing.max(self.cipher.block_size());

        let mut input = Buffer::new();
        let result = match self.inner.read(&mut input, request)? {
            Some(count) => self.cipher.update(&input.consume_to_vec(count)),
            None => self.finalize(),
        };

        match result {
            Ok(output) => {
                self.output.put_slice(&output);
                Ok(())
            }
            Err(error) => {
                self.poisoned = !error.is_retryable();
                Err(error)
            }
        }
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        self.inner.timeout().start().check()?;

        let output = self.cipher.finalize()?;

        tracing::event!(
            name: "pipebuf.cipher.finalize",
            tracing::Level::DEBUG,
            cipher.final_bytes = output.len(),
            "cipher finalized"
        );

        Ok(output)
    }
}

impl<S: Source, C: Cipher> Source for CipherSource<S, C> {
    fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>> {
        check_read_request(byte_count)?;

        if self.closed {
            return Err(Error::ClosedResource);
        }

        if self.poisoned {
            return Err(Error::MalformedStream("the cipher stream previously failed".to_string()));
        }

        if byte_count == 0 {
            return Ok(Some(0));
        }

        while self.output.len() < byte_count && !self.cipher.is_finalized() {
            self.pull(byte_count)?;
        }

        if self.output.is_empty() {
            return Ok(None);
        }

        let count = byte_count.min(self.output.len());
        sink.move_from(&mut self.output, count);
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
        self.output.clear();
        self.inner.close()
    }
}

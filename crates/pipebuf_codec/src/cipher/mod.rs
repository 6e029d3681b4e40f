// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod cbc;
mod sink;
mod source;

use std::fmt::Debug;

use pipebuf_io::{Error, Result};

pub use self::cbc::{Aes128CbcDecryptor, Aes128CbcEncryptor, Aes256CbcDecryptor, Aes256CbcEncryptor, CbcDecryptor, CbcEncryptor};
pub use self::sink::CipherSink;
pub use self::source::CipherSource;

/// A block cipher transform fed incrementally.
///
/// The cipher buffers partial blocks internally, so `update` may be called with input of any
/// length and returns whatever output became available. `finalize` flushes the buffered state
/// (applying or removing padding) and can be called exactly once.
pub trait Cipher: Debug {
    /// The cipher's block size in bytes.
    fn block_size(&self) -> usize;

    /// Feeds `input` into the cipher and returns the output it produced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedStream`] if the cipher has already been finalized.
    fn update(&mut self, input: &[u8]) -> Result<Vec<u8>>;

    /// Flushes the final block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedStream`] if the cipher has already been finalized, or if the
    /// buffered input cannot be completed (e.g. invalid padding when decrypting).
    fn finalize(&mut self) -> Result<Vec<u8>>;

    /// Whether [`finalize()`][Cipher::finalize] has been called.
    fn is_finalized(&self) -> bool;
}

#[cfg_attr(coverage_nightly, coverage(off))] // Trivial forwarder.
impl<T: Cipher + ?Sized> Cipher for Box<T> {
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        (**self).update(input)
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn finalize(&mut self) -> Result<Vec<u8>> {
        (**self).finalize()
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn is_finalized(&self) -> bool {
        (**self).is_finalized()
    }
}

fn already_finalized() -> Error {
    Error::MalformedStream("the cipher has already been finalized".to_string())
}

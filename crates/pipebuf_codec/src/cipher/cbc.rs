// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use ::cbc::cipher::block_padding::{Padding, Pkcs7};
use ::cbc::cipher::generic_array::GenericArray;
use ::cbc::cipher::{Block, BlockCipher, BlockDecryptMut, BlockEncryptMut, BlockSizeUser, KeyInit, KeyIvInit};
use aes::{Aes128, Aes256};
use pipebuf_io::{Error, Result};

use super::{Cipher, already_finalized};

/// AES-128 in CBC mode with PKCS#7 padding, encrypting.
pub type Aes128CbcEncryptor = CbcEncryptor<Aes128>;

/// AES-128 in CBC mode with PKCS#7 padding, decrypting.
pub type Aes128CbcDecryptor = CbcDecryptor<Aes128>;

/// AES-256 in CBC mode with PKCS#7 padding, encrypting.
pub type Aes256CbcEncryptor = CbcEncryptor<Aes256>;

/// AES-256 in CBC mode with PKCS#7 padding, decrypting.
pub type Aes256CbcDecryptor = CbcDecryptor<Aes256>;

/// Encrypts with block cipher `C` in CBC mode, padding the final block with PKCS#7.
///
/// Every complete block is encrypted as soon as [`update()`][Cipher::update] receives it.
/// [`finalize()`][Cipher::finalize] always emits one more block, which is a full block of
/// padding if the plaintext length was a multiple of the block size (including empty plaintext).
pub struct CbcEncryptor<C>
where
    C: BlockEncryptMut + BlockCipher,
{
    mode: Option<::cbc::Encryptor<C>>,
    pending: Vec<u8>,
}

impl<C> CbcEncryptor<C>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    /// Creates an encryptor from a key and an initialization vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the key or IV length does not suit the cipher.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let mode = ::cbc::Encryptor::<C>::new_from_slices(key, iv)
            .map_err(|error| Error::InvalidArgument(format!("invalid key or IV: {error}")))?;

        Ok(Self {
            mode: Some(mode),
            pending: Vec::new(),
        })
    }
}

impl<C> Cipher for CbcEncryptor<C>
where
    C: BlockEncryptMut + BlockCipher,
{
    fn block_size(&self) -> usize {
        C::block_size()
    }

    fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mode = self.mode.as_mut().ok_or_else(already_finalized)?;
        let block_size = C::block_size();

        self.pending.extend_from_slice(input);
        let ready = self.pending.len() / block_size * block_size;

        let mut output: Vec<u8> = self.pending.drain(..ready).collect();
        for block in output.chunks_exact_mut(block_size) {
            mode.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }

        Ok(output)
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        let mut mode = self.mode.take().ok_or_else(already_finalized)?;

        // `update` leaves less than one block pending.
        let filled = self.pending.len();
        let mut block = Block::<C>::default();
        block[..filled].copy_from_slice(&self.pending);
        self.pending.clear();

        <Pkcs7 as Padding<<C as BlockSizeUser>::BlockSize>>::pad(&mut block, filled);
        mode.encrypt_block_mut(&mut block);

        Ok(block.to_vec())
    }

    fn is_finalized(&self) -> bool {
        self.mode.is_none()
    }
}

impl<C> fmt::Debug for CbcEncryptor<C>
where
    C: BlockEncryptMut + BlockCipher,
{
    #[cfg_attr(test, mutants::skip)] // We have no API contract for this.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CbcEncryptor")
            .field("block_size", &C::block_size())
            .field("pending", &self.pending.len())
            .field("finalized", &self.mode.is_none())
            .finish_non_exhaustive()
    }
}

/// Decrypts with block cipher `C` in CBC mode, removing PKCS#7 padding from the final block.
///
/// The last complete block seen so far is withheld from [`update()`][Cipher::update] output,
/// because only [`finalize()`][Cipher::finalize] can tell whether it is the padded final block.
pub struct CbcDecryptor<C>
where
    C: BlockDecryptMut + BlockCipher,
{
    mode: Option<::cbc::Decryptor<C>>,
    pending: Vec<u8>,
}

impl<C> CbcDecryptor<C>
where
    C: BlockDecryptMut + BlockCipher + KeyInit,
{
    /// Creates a decryptor from a key and an initialization vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the key or IV length does not suit the cipher.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let mode = ::cbc::Decryptor::<C>::new_from_slices(key, iv)
            .map_err(|error| Error::InvalidArgument(format!("invalid key or IV: {error}")))?;

        Ok(Self {
            mode: Some(mode),
            pending: Vec::new(),
        })
    }
}

impl<C> Cipher for CbcDecryptor<C>
where
    C: BlockDecryptMut + BlockCipher,
{
    fn block_size(&self) -> usize {
        C::block_size()
    }

    fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mode = self.mode.as_mut().ok_or_else(already_finalized)?;
        let block_size = C::block_size();

        self.pending.extend_from_slice(input);
        if self.pending.len() <= block_size {
            return Ok(Vec::new());
        }

        // Keep the partial tail, or the last whole block if there is no partial tail.
        let withheld = match self.pending.len() % block_size {
            0 => block_size,
            partial => partial,
        };
        let ready = self.pending.len() - withheld;

        let mut output: Vec<u8> = self.pending.drain(..ready).collect();
        for block in output.chunks_exact_mut(block_size) {
            mode.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }

        Ok(output)
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        let mut mode = self.mode.take().ok_or_else(already_finalized)?;
        let block_size = C::block_size();

        if self.pending.len() != block_size {
            return Err(Error::MalformedStream(format!(
                "ciphertext ends with {} bytes instead of one {block_size}-byte block",
                self.pending.len()
            )));
        }

        let mut block = Block::<C>::clone_from_slice(&self.pending);
        self.pending.clear();
        mode.decrypt_block_mut(&mut block);

        let plaintext = <Pkcs7 as Padding<<C as BlockSizeUser>::BlockSize>>::unpad(&block)
            .map_err(|error| Error::MalformedStream(format!("invalid PKCS#7 padding: {error}")))?;

        Ok(plaintext.to_vec())
    }

    fn is_finalized(&self) -> bool {
        self.mode.is_none()
    }
}

impl<C> fmt::Debug for CbcDecryptor<C>
where
    C: BlockDecryptMut + BlockCipher,
{
    #[cfg_attr(test, mutants::skip)] // We have no API contract for this.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CbcDecryptor")
            .field("block_size", &C::block_size())
            .field("pending", &self.pending.len())
            .field("finalized", &self.mode.is_none())
            .finish_non_exhaustive()
    }
}

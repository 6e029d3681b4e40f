// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Streaming transforms that decorate [`pipebuf_io`] sources and sinks.
//!
//! Codecs operate on fixed-size blocks (4 encoded bytes per 3 decoded bytes for Base64, the
//! cipher block for block ciphers), while callers read and write in whatever sizes suit them.
//! The decorators in this crate re-chunk the stream so that the codec only ever sees whole
//! blocks, buffering at most one partial block between calls.
//!
//! * [`Base64Sink`] encodes what is written to it; [`Base64Source`] decodes what it reads.
//! * [`CipherSink`] encrypts what is written to it; [`CipherSource`] decrypts what it reads. Any
//!   [`Cipher`] can drive them; AES-CBC with PKCS#7 padding is provided.
//!
//! Decorators own the endpoint they wrap and compose freely:
//!
//! ```
//! use pipebuf_codec::{Aes128CbcDecryptor, Aes128CbcEncryptor, Base64Sink, Base64Source, CipherSink, CipherSource};
//! use pipebuf_io::{ChannelSink, ChannelSource, Sink, SinkExt, SourceExt};
//!
//! let key = [7_u8; 16];
//! let iv = [9_u8; 16];
//!
//! // Encrypt, then Base64-encode, into memory.
//! let mut text = Vec::new();
//! let encryptor = Aes128CbcEncryptor::new(&key, &iv).unwrap();
//! let mut sink = CipherSink::new(Base64Sink::new(ChannelSink::new(&mut text)), encryptor);
//! sink.write_slice(b"attack at dawn").unwrap();
//! sink.close().unwrap();
//! drop(sink);
//!
//! // One padded AES block, Base64-encoded.
//! assert_eq!(text.len(), 24);
//!
//! // Base64-decode, then decrypt.
//! let decryptor = Aes128CbcDecryptor::new(&key, &iv).unwrap();
//! let mut source = CipherSource::new(Base64Source::new(ChannelSource::new(text.as_slice())), decryptor);
//!
//! assert_eq!(source.read_to_end().unwrap().to_vec(), b"attack at dawn");
//! ```

mod base64;
mod cipher;

pub use self::base64::{BASE64_BLOCK, Base64Sink, Base64Source, DECODED_BLOCK};
pub use self::cipher::{
    Aes128CbcDecryptor, Aes128CbcEncryptor, Aes256CbcDecryptor, Aes256CbcEncryptor, CbcDecryptor, CbcEncryptor, Cipher,
    CipherSink, CipherSource,
};

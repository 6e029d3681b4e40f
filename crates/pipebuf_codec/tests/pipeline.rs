// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#![allow(missing_docs, reason = "Tests")]

use std::num::NonZero;
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use fastrand::Rng;
use pipebuf::Buffer;
use pipebuf_codec::{
    Aes128CbcDecryptor, Aes128CbcEncryptor, Aes256CbcDecryptor, Aes256CbcEncryptor, Base64Sink, Base64Source, Cipher,
    CipherSink, CipherSource,
};
use pipebuf_io::testing::{FakeSink, FakeSource, SlowChannel};
use pipebuf_io::{ChannelSink, Error, FileSink, FileSource, Sink, SinkExt, Source, Timeout};
use tempfile::TempDir;

const KEY_128: [u8; 16] = *b"pipebuf test key";
const KEY_256: [u8; 32] = *b"pipebuf test key, 256 bits long!";
const IV: [u8; 16] = *b"initial vector!!";

// Payload lengths around the 3-byte Base64 group and the 16-byte AES block.
const INTERESTING_LENGTHS: &[usize] = &[0, 1, 2, 3, 4, 15, 16, 17, 31, 32, 33, 47, 48, 49, 1000, 20_000];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn random_payload(rng: &mut Rng, len: usize) -> Vec<u8> {
    std::iter::repeat_with(|| rng.u8(..)).take(len).collect()
}

fn write_in_random_sizes(sink: &mut impl Sink, payload: &[u8], rng: &mut Rng, max_write: usize) {
    let mut rest = payload;
    while !rest.is_empty() {
        let size = rng.usize(1..=max_write.min(rest.len()));
        sink.write_slice(&rest[..size]).unwrap();
        rest = &rest[size..];
    }
}

fn read_in_random_sizes(source: &mut impl Source, rng: &mut Rng, max_read: usize) -> Vec<u8> {
    let mut output = Buffer::new();
    while source.read(&mut output, rng.usize(1..=max_read)).unwrap().is_some() {}
    output.to_vec()
}

fn encrypt_to_file(path: &Path, cipher: impl Cipher, payload: &[u8], rng: &mut Rng) {
    let mut sink = CipherSink::new(Base64Sink::new(FileSink::create(path).unwrap()), cipher);
    write_in_random_sizes(&mut sink, payload, rng, 100);
    sink.close().unwrap();
}

fn decrypt_from_file(path: &Path, cipher: impl Cipher, rng: &mut Rng) -> Vec<u8> {
    let mut source = CipherSource::new(Base64Source::new(FileSource::open(path).unwrap()), cipher);
    let plaintext = read_in_random_sizes(&mut source, rng, 100);
    source.close().unwrap();
    plaintext
}

fn slow_channel() -> SlowChannel {
    SlowChannel::builder()
        .delay(Duration::from_millis(2))
        .max_transfer(NonZero::new(3).unwrap())
        .build()
}

fn retry_until_done(mut operation: impl FnMut() -> Result<(), Error>) -> usize {
    let mut retries = 0;
    loop {
        match operation() {
            Ok(()) => return retries,
            Err(error) if error.is_retryable() => retries += 1,
            Err(error) => panic!("unexpected failure: {error}"),
        }
    }
}

fn reference_ciphertext(payload: &[u8]) -> Vec<u8> {
    cbc::Encryptor::<aes::Aes128>::new_from_slices(&KEY_128, &IV)
        .unwrap()
        .encrypt_padded_vec_mut::<Pkcs7>(payload)
}

// ---------------------------------------------------------------------------
// Cipher over Base64 over file
// ---------------------------------------------------------------------------

#[test]
fn encrypted_base64_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut rng = Rng::with_seed(0x5eed);

    for &len in INTERESTING_LENGTHS {
        let path = dir.path().join(format!("payload-{len}.b64"));
        let payload = random_payload(&mut rng, len);

        encrypt_to_file(&path, Aes128CbcEncryptor::new(&KEY_128, &IV).unwrap(), &payload, &mut rng);

        // The file holds exactly the Base64 text of the raw cipher output.
        let text = std::fs::read(&path).unwrap();
        assert_eq!(text, STANDARD.encode(reference_ciphertext(&payload)).as_bytes(), "length {len}");

        let decrypted = decrypt_from_file(&path, Aes128CbcDecryptor::new(&KEY_128, &IV).unwrap(), &mut rng);
        assert_eq!(decrypted, payload, "length {len}");
    }
}

#[test]
fn aes_256_round_trip_with_boxed_cipher() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("payload.b64");
    let mut rng = Rng::with_seed(256);
    let payload = random_payload(&mut rng, 5000);

    let encryptor: Box<dyn Cipher + Send> = Box::new(Aes256CbcEncryptor::new(&KEY_256, &IV).unwrap());
    encrypt_to_file(&path, encryptor, &payload, &mut rng);

    let decryptor: Box<dyn Cipher + Send> = Box::new(Aes256CbcDecryptor::new(&KEY_256, &IV).unwrap());
    assert_eq!(decrypt_from_file(&path, decryptor, &mut rng), payload);
}

#[test]
fn empty_payload_produces_one_padding_block() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.b64");
    let mut rng = Rng::with_seed(0);

    encrypt_to_file(&path, Aes128CbcEncryptor::new(&KEY_128, &IV).unwrap(), b"", &mut rng);

    // 16 bytes of padding encode to 24 Base64 characters.
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 24);

    let decrypted = decrypt_from_file(&path, Aes128CbcDecryptor::new(&KEY_128, &IV).unwrap(), &mut rng);
    assert!(decrypted.is_empty());
}

#[test]
fn wrong_key_is_not_silently_accepted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("payload.b64");
    let mut rng = Rng::with_seed(7);
    let payload = random_payload(&mut rng, 100);

    encrypt_to_file(&path, Aes128CbcEncryptor::new(&KEY_128, &IV).unwrap(), &payload, &mut rng);

    let decryptor = Aes128CbcDecryptor::new(&[0; 16], &IV).unwrap();
    let mut source = CipherSource::new(Base64Source::new(FileSource::open(&path).unwrap()), decryptor);

    let mut output = Buffer::new();
    let outcome = loop {
        match source.read(&mut output, 64) {
            Ok(Some(_)) => {}
            Ok(None) => break Ok(()),
            Err(error) => break Err(error),
        }
    };

    match outcome {
        Err(error) => assert!(matches!(error, Error::MalformedStream(_))),
        Ok(()) => assert_ne!(output.to_vec(), payload),
    }
}

// ---------------------------------------------------------------------------
// Base64 alignment
// ---------------------------------------------------------------------------

#[test]
fn base64_output_is_independent_of_write_sizes() {
    let mut rng = Rng::with_seed(3);

    for len in 0..64 {
        let payload = random_payload(&mut rng, len);
        let expected = STANDARD.encode(&payload);

        for max_write in [1, 2, 3, 4, 7] {
            let mut sink = Base64Sink::new(FakeSink::new());
            write_in_random_sizes(&mut sink, &payload, &mut rng, max_write);
            sink.close().unwrap();

            assert_eq!(sink.inner().contents(), expected.as_bytes(), "length {len}");
        }
    }
}

#[test]
fn base64_decoding_is_independent_of_read_sizes() {
    let mut rng = Rng::with_seed(4);

    for len in 0..64 {
        let payload = random_payload(&mut rng, len);
        let encoded = STANDARD.encode(&payload);

        for max_read in [1, 2, 3, 4, 5, 11] {
            let mut source = Base64Source::new(FakeSource::new(encoded.as_bytes()));

            assert_eq!(read_in_random_sizes(&mut source, &mut rng, max_read), payload, "length {len}");
        }
    }
}

#[test]
fn segmented_encoding_decodes_to_concatenation() {
    let mut rng = Rng::with_seed(5);
    let payload = random_payload(&mut rng, 500);

    let mut sink = Base64Sink::new(FakeSink::new()).segmented();
    write_in_random_sizes(&mut sink, &payload, &mut rng, 10);
    sink.close().unwrap();

    let encoded = sink.into_inner().unwrap().into_contents();
    assert!(encoded.contains(&b'='));

    let mut source = Base64Source::new(FakeSource::new(encoded));
    assert_eq!(read_in_random_sizes(&mut source, &mut rng, 13), payload);
}

#[test]
fn truncated_base64_file_is_malformed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("truncated.b64");
    std::fs::write(&path, b"YWJjZGVm\nYQ").unwrap();

    let mut source = Base64Source::new(FileSource::open(&path).unwrap());
    let mut output = Buffer::new();

    assert!(matches!(source.read(&mut output, 100), Err(Error::MalformedStream(_))));
}

// ---------------------------------------------------------------------------
// Timeouts through the decorator stack
// ---------------------------------------------------------------------------

#[test]
fn timed_out_stack_resumes_after_timeout_is_relaxed() {
    let mut rng = Rng::with_seed(11);
    let payload = random_payload(&mut rng, 100);
    let mut channel = slow_channel();

    let inner = ChannelSink::new(&mut channel).with_timeout(Timeout::after(Duration::from_millis(10)));
    let cipher = Aes128CbcEncryptor::new(&KEY_128, &IV).unwrap();
    let mut sink = CipherSink::new(Base64Sink::new(inner), cipher);

    let error = sink.write_slice(&payload[..60]).unwrap_err();
    assert!(matches!(error, Error::TimedOut { .. }));

    sink.inner_mut().inner_mut().set_timeout(Timeout::none());
    sink.write_slice(&payload[60..]).unwrap();
    sink.close().unwrap();
    assert!(sink.inner().inner().is_closed());
    drop(sink);

    assert_eq!(channel.written(), STANDARD.encode(reference_ciphertext(&payload)).as_bytes());
}

#[test]
fn retrying_under_a_short_timeout_delivers_every_byte() {
    let mut rng = Rng::with_seed(12);
    let payload = random_payload(&mut rng, 200);
    let mut channel = slow_channel();

    let inner = ChannelSink::new(&mut channel).with_timeout(Timeout::after(Duration::from_millis(6)));
    let cipher = Aes128CbcEncryptor::new(&KEY_128, &IV).unwrap();
    let mut sink = CipherSink::new(Base64Sink::new(inner), cipher);

    let mut retries = 0;
    for piece in payload.chunks(50) {
        let mut input = Buffer::copied_from_slice(piece);

        // A retry that fails before consuming its input sees the same bytes again; one that fails
        // later only has held-back output left to deliver.
        retries += retry_until_done(|| {
            let len = input.len();
            sink.write(&mut input, len)
        });
        assert!(input.is_empty());
    }

    retries += retry_until_done(|| sink.close());
    assert!(retries > 0);
    drop(sink);

    let text = channel.written().to_vec();
    assert_eq!(text, STANDARD.encode(reference_ciphertext(&payload)).as_bytes());

    let decryptor = Aes128CbcDecryptor::new(&KEY_128, &IV).unwrap();
    let mut source = CipherSource::new(Base64Source::new(FakeSource::new(text)), decryptor);
    assert_eq!(read_in_random_sizes(&mut source, &mut rng, 37), payload);
}

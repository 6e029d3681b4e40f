// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#![allow(missing_docs, reason = "Tests")]
#![allow(clippy::assertions_on_result_states, reason = "Tests use assert!(x.is_err()) for clarity")]

use std::io::Read;
use std::time::{Duration, Instant};

use pipebuf::Buffer;
use pipebuf_io::{ChannelSource, Error, FileSink, FileSource, Sink, SinkExt, Source, SourceExt, Timeout};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

/// Produces one byte per call after sleeping, forever.
#[derive(Debug)]
struct Trickle {
    delay: Duration,
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::thread::sleep(self.delay);
        buf[0] = b'.';
        Ok(1)
    }
}

// ---------------------------------------------------------------------------
// File adapters
// ---------------------------------------------------------------------------

#[test]
fn file_round_trip_across_segments() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("round_trip.bin");
    let data = payload(50_000);

    let mut sink = FileSink::create(&path).unwrap();
    for chunk in data.chunks(7_777) {
        sink.write_slice(chunk).unwrap();
    }
    sink.flush().unwrap();
    assert_eq!(sink.position(), 50_000);
    sink.close().unwrap();

    let mut source = FileSource::open(&path).unwrap();
    let contents = source.read_to_end().unwrap();

    assert_eq!(contents.len(), 50_000);
    assert_eq!(contents.to_vec(), data);
}

#[test]
fn file_source_eof_is_stable() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("short.bin");
    std::fs::write(&path, b"abc").unwrap();

    let mut source = FileSource::open(&path).unwrap();
    let mut buffer = Buffer::new();

    assert_eq!(source.read(&mut buffer, 3).unwrap(), Some(3));
    for _ in 0..3 {
        assert_eq!(source.read(&mut buffer, 3).unwrap(), None);
    }

    // A zero-length request is answered even at the end of the stream.
    assert_eq!(source.read(&mut buffer, 0).unwrap(), Some(0));
}

#[test]
fn empty_file_ends_immediately() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("empty.bin");
    std::fs::write(&path, b"").unwrap();

    let mut source = FileSource::open(&path).unwrap();
    assert_eq!(source.read(&mut Buffer::new(), 10).unwrap(), None);
}

#[test]
fn copy_file_through_channel_source() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("copy.bin");
    let data = payload(20_000);

    let mut source = ChannelSource::new(data.as_slice());
    let mut sink = FileSink::create(&path).unwrap();

    assert_eq!(source.copy_to(&mut sink).unwrap(), 20_000);
    sink.close().unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), data);
}

#[test]
fn boxed_endpoints_compose() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("boxed.bin");

    let mut sink: Box<dyn Sink> = Box::new(FileSink::create(&path).unwrap());
    sink.write_slice(b"boxed").unwrap();
    sink.close().unwrap();

    let mut source: Box<dyn Source> = Box::new(FileSource::open(&path).unwrap());
    assert_eq!(source.read_exactly(5).unwrap().to_vec(), b"boxed");
    assert!(source.timeout().is_unbounded());
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

#[test]
fn slow_channel_read_times_out_near_deadline() {
    let mut source = ChannelSource::new(Trickle {
        delay: Duration::from_millis(50),
    });

    let started = Instant::now();
    source.set_timeout(Timeout::at(started + Duration::from_millis(200)));

    let mut buffer = Buffer::new();
    let error = loop {
        match source.read(&mut buffer, 1) {
            Ok(_) => {}
            Err(error) => break error,
        }
    };

    assert!(matches!(error, Error::TimedOut { .. }));
    assert!(started.elapsed() < Duration::from_secs(1));

    // Everything read before the deadline is still there.
    assert!(!buffer.is_empty());
    assert!(buffer.to_vec().iter().all(|b| *b == b'.'));
}

#[test]
fn expired_timeout_fails_file_read_without_transfer() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("deadline.bin");
    std::fs::write(&path, b"abc").unwrap();

    let mut source = FileSource::open(&path).unwrap().with_timeout(Timeout::after(Duration::ZERO));
    let mut buffer = Buffer::new();

    let error = source.read(&mut buffer, 3).unwrap_err();
    assert!(error.is_retryable());
    assert_eq!(source.position(), 0);

    // Retrying under a relaxed policy picks up where the failed call left off.
    source.set_timeout(Timeout::none());
    assert_eq!(source.read(&mut buffer, 3).unwrap(), Some(3));
}

#[test]
fn io_error_conversion_preserves_kind() {
    let error: std::io::Error = Error::TimedOut {
        elapsed: Duration::from_millis(1),
    }
    .into();
    assert_eq!(error.kind(), std::io::ErrorKind::TimedOut);
}

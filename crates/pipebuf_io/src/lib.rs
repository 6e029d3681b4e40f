// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Blocking byte-stream abstractions expressed via `pipebuf` types.
//!
//! These types model byte sources that can be pulled from ([`Source`] trait) and byte sinks that
//! can be pushed to ([`Sink`] trait). Data moves between endpoints in [`pipebuf::Buffer`]s, so
//! endpoints that merely forward bytes can hand segments along without copying them.
//!
//! Every operation runs on the calling thread and may block. Each endpoint owns a [`Timeout`]
//! policy that is consulted before every blocking wait, which bounds the worst-case latency of a
//! single call.
//!
//! Endpoints are composed by wrapping: a decorator owns the endpoint it wraps, forwards calls to
//! it and closes it when it is itself closed. This crate provides the endpoints at the bottom of
//! such a chain:
//!
//! * [`ChannelSource`] and [`ChannelSink`] adapt any [`std::io::Read`] or [`std::io::Write`].
//! * [`FileSource`] and [`FileSink`] perform positional I/O on a [`std::fs::File`].
//!
//! The `test-util` feature enables additional utilities for testing implementations of
//! types that produce or consume streams of bytes. These are in the `testing` module.
//!
//! # Example
//!
//! ```
//! use pipebuf_io::{ChannelSink, ChannelSource, SinkExt, SourceExt};
//!
//! let mut sink = ChannelSink::new(Vec::new());
//! sink.write_slice(b"Hello, world!").unwrap();
//!
//! let written = sink.into_inner().unwrap();
//!
//! let mut source = ChannelSource::new(written.as_slice());
//! let contents = source.read_to_end().unwrap();
//!
//! assert_eq!(contents.to_vec(), b"Hello, world!");
//! ```

mod channel;
mod error;
mod file;
mod request;
mod sink;
mod sink_ext;
mod source;
mod source_ext;
mod timeout;

pub use channel::{ChannelSink, ChannelSource};
pub use error::{Error, Result};
pub use file::{FileSink, FileSource};
pub use request::{MAX_REQUEST_LENGTH, check_read_request, check_write_request};
pub use sink::Sink;
pub use sink_ext::SinkExt;
pub use source::Source;
pub use source_ext::SourceExt;
pub use timeout::{Deadline, Timeout};

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

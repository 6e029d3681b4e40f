// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Segmented byte buffers for streaming pipelines.
//!
//! A [`Buffer`] is an ordered, growable sequence of bytes stored in a queue of fixed-capacity
//! segments. Appending to the back and consuming from the front are both cheap, and whole
//! segments can be handed from one buffer to another without copying their contents.
//!
//! # Producing bytes in place
//!
//! I/O endpoints rarely know how many bytes an operating system call will produce until the
//! call returns. Instead of reserving memory, handing out a raw region and later committing a
//! length in a separate step, a buffer lends out its spare capacity for the duration of a closure:
//!
//! ```
//! use pipebuf::Buffer;
//!
//! let mut buf = Buffer::new();
//!
//! let written = buf
//!     .write_with(16, |cursor| {
//!         let dst = cursor.as_mut_slice();
//!         dst[..5].copy_from_slice(b"hello");
//!         Ok::<_, std::convert::Infallible>(5)
//!     })
//!     .unwrap();
//!
//! assert_eq!(written, 5);
//! assert_eq!(buf.to_vec(), b"hello");
//! ```
//!
//! The closure receives a [`ByteCursor`] that cannot outlive the call. Its return value is the
//! number of bytes that were filled, which is the only length that becomes visible in the buffer.
//! Capacity that was exposed but not filled is given back, so a read that hits end of stream
//! leaves the buffer exactly as it was.
//!
//! # Consuming bytes in place
//!
//! [`Buffer::read_with()`] is the mirror image: the closure sees the readable bytes of the head
//! segment and reports how many of them it consumed.

mod buffer;
mod cursor;
mod segment;

pub use buffer::{Buffer, Chunks};
pub use cursor::ByteCursor;

/// Capacity of each segment allocated by a [`Buffer`].
///
/// This is also the largest contiguous region that a single [`Buffer::write_with()`] call exposes.
pub const SEGMENT_SIZE: usize = 8192;

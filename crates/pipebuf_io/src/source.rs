// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

use pipebuf::Buffer;

use crate::{Result, Timeout};

/// Allows bytes to be pulled from an endpoint.
///
/// # Ownership
///
/// The methods on this trait accept `&mut self` and take an exclusive reference to the source for
/// the duration of the operation. Only one operation can be in flight on a source at a time.
///
/// A source that decorates another source owns it. Closing the decorator closes the source it
/// wraps.
///
/// # Blocking
///
/// Reads block the calling thread. Implementations check a [`Deadline`][crate::Deadline] started
/// from [`timeout()`][Source::timeout] before every blocking wait, failing with
/// [`Error::TimedOut`][crate::Error::TimedOut] once it is reached.
pub trait Source: Debug {
    /// Reads at most `byte_count` bytes and appends them to `sink`.
    ///
    /// Any data already in `sink` is left untouched.
    ///
    /// Returns `Some(n)` with the number of bytes appended, or `None` once the stream has ended
    /// and no more bytes will ever be produced. After the first `None`, every subsequent read
    /// also returns `None`.
    ///
    /// A `byte_count` of zero is a no-op that returns `Some(0)` without blocking.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`][crate::Error::InvalidArgument] if `byte_count` exceeds
    ///   [`MAX_REQUEST_LENGTH`][crate::MAX_REQUEST_LENGTH].
    /// * [`Error::ClosedResource`][crate::Error::ClosedResource] if the source has been closed.
    /// * [`Error::TimedOut`][crate::Error::TimedOut] if the deadline passed during the read.
    ///   Bytes already appended to `sink` stay there.
    /// * Any error of the underlying endpoint or transform.
    fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>>;

    /// The deadline policy consulted by blocking waits.
    fn timeout(&self) -> &Timeout;

    /// Releases the source and everything it wraps.
    ///
    /// Closing is idempotent; closing an already closed source does nothing.
    ///
    /// # Errors
    ///
    /// Any error reported by the underlying endpoint while releasing it.
    fn close(&mut self) -> Result<()>;
}

#[cfg_attr(coverage_nightly, coverage(off))] // Trivial forwarder.
impl<T: Source + ?Sized> Source for &mut T {
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>> {
        (**self).read(sink, byte_count)
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn timeout(&self) -> &Timeout {
        (**self).timeout()
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // Trivial forwarder.
impl<T: Source + ?Sized> Source for Box<T> {
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>> {
        (**self).read(sink, byte_count)
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn timeout(&self) -> &Timeout {
        (**self).timeout()
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

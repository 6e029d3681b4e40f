// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

use pipebuf::Buffer;

use crate::{Result, Timeout};

/// Allows bytes to be pushed into an endpoint.
///
/// # Ownership
///
/// The methods on this trait accept `&mut self` and take an exclusive reference to the sink for
/// the duration of the operation. Only one operation can be in flight on a sink at a time.
///
/// A sink that decorates another sink owns it. Closing the decorator first flushes any residual
/// state it holds into the wrapped sink, then closes the wrapped sink.
///
/// # Blocking
///
/// Writes block the calling thread. Implementations check a [`Deadline`][crate::Deadline] started
/// from [`timeout()`][Sink::timeout] before every blocking wait, failing with
/// [`Error::TimedOut`][crate::Error::TimedOut] once it is reached.
pub trait Sink: Debug {
    /// Drains exactly `byte_count` bytes from the front of `source` into the sink.
    ///
    /// A write either consumes all `byte_count` bytes or fails. Implementations loop internally
    /// over endpoints that accept only part of a request per call.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`][crate::Error::InvalidArgument] if `byte_count` exceeds the
    ///   number of bytes in `source` or [`MAX_REQUEST_LENGTH`][crate::MAX_REQUEST_LENGTH].
    /// * [`Error::ClosedResource`][crate::Error::ClosedResource] if the sink has been closed.
    /// * [`Error::TimedOut`][crate::Error::TimedOut] if the deadline passed during the write. The
    ///   bytes already transferred have been removed from `source`; the rest remain in it. A
    ///   transforming decorator consumes its input before forwarding, so it keeps the transformed
    ///   bytes that were not delivered and sends them first on the next write, flush or close.
    /// * Any error of the underlying endpoint or transform.
    fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<()>;

    /// Pushes all buffered bytes to the underlying endpoint.
    ///
    /// # Errors
    ///
    /// Any error of the underlying endpoint or transform.
    fn flush(&mut self) -> Result<()>;

    /// The deadline policy consulted by blocking waits.
    fn timeout(&self) -> &Timeout;

    /// Flushes residual state, then releases the sink and everything it wraps.
    ///
    /// Closing is idempotent; closing an already closed sink does nothing.
    ///
    /// # Errors
    ///
    /// Any error raised while flushing or releasing the underlying endpoint. If residual state
    /// could not be delivered because of a retryable error, the sink stays open and the close can
    /// be retried. After any other error the sink counts as closed.
    fn close(&mut self) -> Result<()>;
}

#[cfg_attr(coverage_nightly, coverage(off))] // Trivial forwarder.
impl<T: Sink + ?Sized> Sink for &mut T {
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<()> {
        (**self).write(source, byte_count)
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn flush(&mut self) -> Result<()> {
        (**self).flush()
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
impl<T: Sink + ?Sized> Sink for Box<T> {
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<()> {
        (**self).write(source, byte_count)
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn flush(&mut self) -> Result<()> {
        (**self).flush()
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

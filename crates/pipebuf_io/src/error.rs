// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::ErrorKind;
use std::time::Duration;

use thiserror::Error;

/// Any error that may arise from reading from a [`Source`][crate::Source] or writing to a
/// [`Sink`][crate::Sink], including the transforms layered on top of them.
///
/// Errors are always surfaced to the immediate caller. Bytes that were already committed to a
/// buffer before the failure stay where they are, so the caller can inspect them or retry where
/// that makes sense (see [`is_retryable()`][Self::is_retryable]).
///
/// # Thread safety
///
/// This type is thread-safe.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The call parameters were malformed, e.g. a byte count that exceeds
    /// [`MAX_REQUEST_LENGTH`][crate::MAX_REQUEST_LENGTH] or the bytes available to a write.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation was attempted after the endpoint was closed.
    #[error("operation on a closed resource")]
    ClosedResource,

    /// The endpoint's deadline passed while the operation was waiting.
    ///
    /// Partial progress is preserved and the operation may be retried.
    #[error("timed out after {elapsed:?}")]
    TimedOut {
        /// How long the failed call had been running when the deadline was detected.
        elapsed: Duration,
    },

    /// The stream violated the structure expected by a transform, e.g. a truncated block or an
    /// invalid character in an encoded stream, or a cipher was finalized twice.
    ///
    /// The endpoint that reported this must not be used again.
    #[error("malformed stream: {0}")]
    MalformedStream(String),

    /// We are forwarding an error received from the standard library's I/O APIs.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether repeating the failed call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// A specialized `Result` for stream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents the stream error as a standard I/O error.
/// This is often used when interoperating with other libraries that expect standard I/O errors.
impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(error) => error,
            Error::TimedOut { .. } => Self::new(ErrorKind::TimedOut, value),
            Error::InvalidArgument(_) => Self::new(ErrorKind::InvalidInput, value),
            Error::MalformedStream(_) => Self::new(ErrorKind::InvalidData, value),
            Error::ClosedResource => Self::other(value),
        }
    }
}

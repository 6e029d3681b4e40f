// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use pipebuf::Buffer;

use crate::{Error, Result};

/// The largest `byte_count` accepted by a single read or write.
///
/// Transforms scale request sizes by their block ratios (e.g. 4/3 for Base64), so requests are
/// capped well below `usize::MAX` to keep that arithmetic from overflowing.
pub const MAX_REQUEST_LENGTH: usize = usize::MAX / 4;

/// Validates the `byte_count` of a read request.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `byte_count` exceeds [`MAX_REQUEST_LENGTH`].
pub fn check_read_request(byte_count: usize) -> Result<()> {
    if byte_count > MAX_REQUEST_LENGTH {
        return Err(Error::InvalidArgument(format!(
            "byte count {byte_count} exceeds the maximum request length {MAX_REQUEST_LENGTH}"
        )));
    }

    Ok(())
}

/// Validates the `byte_count` of a write request against the buffer it drains.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `byte_count` exceeds [`MAX_REQUEST_LENGTH`] or the
/// number of bytes in `source`.
pub fn check_write_request(source: &Buffer, byte_count: usize) -> Result<()> {
    check_read_request(byte_count)?;

    if byte_count > source.len() {
        return Err(Error::InvalidArgument(format!(
            "byte count {byte_count} exceeds the {} bytes available in the source buffer",
            source.len()
        )));
    }

    Ok(())
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

use pipebuf::Buffer;

use crate::{Error, Result, Sink, Source, Timeout, check_read_request, check_write_request};

/// A [`Source`] that reads a file with positional I/O.
///
/// The source tracks its own read position and never moves the file's shared cursor, so several
/// sources may read the same file handle's clones independently. The position advances by the
/// number of bytes each read actually transferred.
///
/// A read at or past the end of the file reports end of stream without issuing a read syscall.
#[derive(Debug)]
pub struct FileSource {
    file: Option<File>,
    position: u64,
    timeout: Timeout,
}

impl FileSource {
    /// Opens the file at `path` for reading from its start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        tracing::event!(
            name: "pipebuf.file.open",
            tracing::Level::DEBUG,
            file.path = %path.display(),
            file.mode = "read",
            "file opened"
        );

        Ok(Self::from_file_at(file, 0))
    }

    /// Reads from an already open file, starting at `position`.
    #[must_use]
    pub fn from_file_at(file: File, position: u64) -> Self {
        Self {
            file: Some(file),
            position,
            timeout: Timeout::none(),
        }
    }

    /// Replaces the timeout policy.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the timeout policy of a source that is already in use.
    pub fn set_timeout(&mut self, timeout: Timeout) {
        self.timeout = timeout;
    }

    /// The offset of the next byte to be read.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }
}

impl Source for FileSource {
    fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>> {
        check_read_request(byte_count)?;
        let file = self.file.as_ref().ok_or(Error::ClosedResource)?;

        if byte_count == 0 {
            return Ok(Some(0));
        }

        let deadline = self.timeout.start();
        deadline.check()?;

        let size = file.metadata()?.len();
        if self.position >= size {
            return Ok(None);
        }

        let available = usize::try_from(size - self.position).unwrap_or(usize::MAX);
        let wanted = byte_count.min(available);
        let position = self.position;

        loop {
            match sink.write_with(wanted, |cursor| positional_read(file, cursor.as_mut_slice(), position)) {
                // The file shrank underneath us.
                Ok(0) => return Ok(None),
                Ok(count) => {
                    self.position += count as u64;
                    return Ok(Some(count));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => deadline.check()?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn timeout(&self) -> &Timeout {
        &self.timeout
    }

    fn close(&mut self) -> Result<()> {
        if self.file.take().is_some() {
            tracing::event!(
                name: "pipebuf.file.close",
                tracing::Level::DEBUG,
                file.position = self.position,
                "file closed"
            );
        }

        Ok(())
    }
}

/// A [`Sink`] that writes a file with positional I/O.
///
/// The sink tracks its own write position, starting at zero for [`create()`][Self::create] and at
/// the current end of the file for [`append()`][Self::append]. A write loops until every byte has
/// reached the file, checking the deadline before each attempt.
///
/// [`flush()`][Sink::flush] makes the written data durable with `sync_data`.
#[derive(Debug)]
pub struct FileSink {
    file: Option<File>,
    position: u64,
    timeout: Timeout,
}

impl FileSink {
    /// Creates (or truncates) the file at `path` and writes from its start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;

        tracing::event!(
            name: "pipebuf.file.open",
            tracing::Level::DEBUG,
            file.path = %path.display(),
            file.mode = "create",
            "file opened"
        );

        Ok(Self::from_file_at(file, 0))
    }

    /// Opens (or creates) the file at `path` and writes after its current end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened or inspected.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Not opened in append mode: some platforms ignore the offset of positional writes on
        // append-mode handles.
        let file = OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
        let position = file.metadata()?.len();

        tracing::event!(
            name: "pipebuf.file.open",
            tracing::Level::DEBUG,
            file.path = %path.display(),
            file.mode = "append",
            file.position = position,
            "file opened"
        );

        Ok(Self::from_file_at(file, position))
    }

    /// Writes to an already open file, starting at `position`.
    #[must_use]
    pub fn from_file_at(file: File, position: u64) -> Self {
        Self {
            file: Some(file),
            position,
            timeout: Timeout::none(),
        }
    }

    /// Replaces the timeout policy.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the timeout policy of a sink that is already in use.
    pub fn set_timeout(&mut self, timeout: Timeout) {
        self.timeout = timeout;
    }

    /// The offset at which the next byte will be written.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }
}

impl Sink for FileSink {
    fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<()> {
        check_write_request(source, byte_count)?;
        let file = self.file.as_ref().ok_or(Error::ClosedResource)?;

        let deadline = self.timeout.start();
        let mut remaining = byte_count;

        while remaining > 0 {
            deadline.check()?;

            let position = self.position;
            let outcome = source.read_with(|chunk| {
                let len = chunk.len().min(remaining);
                positional_write(file, &chunk[..len], position)
            });

            match outcome {
                Ok(0) => return Err(std::io::Error::new(ErrorKind::WriteZero, "file accepted no bytes").into()),
                Ok(count) => {
                    remaining -= count;
                    self.position += count as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let file = self.file.as_ref().ok_or(Error::ClosedResource)?;

        self.timeout.start().check()?;
        file.sync_data()?;
        Ok(())
    }

    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    fn timeout(&self) -> &Timeout {
        &self.timeout
    }

    fn close(&mut self) -> Result<()> {
        if self.file.take().is_some() {
            tracing::event!(
                name: "pipebuf.file.close",
                tracing::Level::DEBUG,
                file.position = self.position,
                "file closed"
            );
        }

        Ok(())
    }
}

/// Reads bytes at `offset` without affecting the cursor.
#[cfg(unix)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

/// Reads bytes at `offset`. Moves the cursor, which this module never relies on.
#[cfg(windows)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

/// Writes bytes at `offset` without affecting the cursor.
#[cfg(unix)]
fn positional_write(file: &File, buf: &[u8], offset: u64) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

/// Writes bytes at `offset`. Moves the cursor, which this module never relies on.
#[cfg(windows)]
fn positional_write(file: &File, buf: &[u8], offset: u64) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(buf, offset)
}

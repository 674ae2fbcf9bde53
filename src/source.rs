//! Byte sources for the ingestion loop
//!
//! The pipeline never assumes a file system. It pulls raw lines through the
//! [`LineSource`] trait, a simple "next line or end of stream" interface.
//!
//! # Implementations
//!
//! - [`ReaderSource`] - Any `BufRead` (files, pipes, sockets wrapped by the caller)
//! - [`MemorySource`] - Lines held in memory, mostly for tests and demos

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Sequential line-oriented input
///
/// `Ok(None)` marks the end of the stream. An `Err` is a read fault and
/// ends the pipeline.
#[cfg_attr(test, mockall::automock)]
pub trait LineSource: Send {
    /// Read the next line without its line terminator
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        (**self).next_line()
    }
}

/// Line source over any buffered reader
///
/// Lines end at `\n`; a trailing `\r` is stripped too. Invalid UTF-8 is
/// replaced rather than treated as a read fault, since the frame scanner
/// skips anything that is not a marker or hex digit anyway.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
    buf: Vec<u8>,
    lines_read: u64,
}

impl<R: BufRead> ReaderSource<R> {
    /// Wrap a buffered reader
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(4096),
            lines_read: 0,
        }
    }

    /// Number of lines returned so far
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}

impl ReaderSource<BufReader<File>> {
    /// Open a capture file
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead + Send> LineSource for ReaderSource<R> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        self.lines_read += 1;
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

/// Line source over lines already in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    lines: VecDeque<String>,
}

impl MemorySource {
    /// Create a source from any collection of lines
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Lines not yet consumed
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl LineSource for MemorySource {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

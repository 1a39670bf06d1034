//! Bounds-checked storage for the lines of one reply.
//!
//! Lines are stored back to back, each followed by [`LINE_DELIMITER`]
//! instead of the `\r\n` seen on the wire. Writes past capacity fail with
//! [`Error::BufferOverflow`] and leave the stored content untouched.

use heapless::Vec;

use super::{LINE_DELIMITER, RESPONSE_BUFFER_SIZE};
use crate::error::Error;

/// Fixed-capacity, delimiter-separated reply lines.
#[derive(Debug, Default, Clone)]
pub struct ResponseBuffer {
    data: Vec<u8, RESPONSE_BUFFER_SIZE>,
}

impl ResponseBuffer {
    /// Creates an empty buffer.
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Drops all stored lines.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Number of stored bytes, delimiters included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Free space left in bytes.
    pub fn remaining(&self) -> usize {
        RESPONSE_BUFFER_SIZE - self.data.len()
    }

    /// Appends one data byte to the line being assembled.
    pub fn push(&mut self, byte: u8) -> Result<(), Error> {
        self.data.push(byte).map_err(|_| Error::BufferOverflow)
    }

    /// Terminates the line being assembled.
    pub fn end_line(&mut self) -> Result<(), Error> {
        self.push(LINE_DELIMITER)
    }

    /// Cuts the buffer back to `len` bytes, discarding a partial line.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Raw content, delimiters included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Line content from `start` up to the end, without the delimiter.
    pub fn line_at(&self, start: usize) -> &[u8] {
        let tail = self.data.get(start..).unwrap_or(&[]);
        match tail.last() {
            Some(&LINE_DELIMITER) => &tail[..tail.len() - 1],
            _ => tail,
        }
    }

    /// Iterates over complete lines.
    pub fn lines(&self) -> impl Iterator<Item = &[u8]> {
        let content = match self.data.last() {
            Some(&LINE_DELIMITER) => &self.data[..self.data.len() - 1],
            _ => &self.data[..],
        };
        content
            .split(|&b| b == LINE_DELIMITER)
            .filter(move |_| !self.data.is_empty())
    }

    /// Returns `true` if any stored byte sequence matches `pattern`.
    pub fn contains(&self, pattern: &[u8]) -> bool {
        super::contains(&self.data, pattern)
    }
}

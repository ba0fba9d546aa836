//! Newline-delimited line framing.
//!
//! Both directions of the link are plain text lines terminated by `\n`.
//! A trailing `\r` is stripped so boards that emit CRLF are handled too.

use heapless::{String, Vec};

/// Maximum line length in bytes, excluding the terminator
pub const MAX_LINE_LEN: usize = 128;

/// Line terminator
pub const LINE_END: u8 = b'\n';

/// Errors that can occur while accumulating a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    /// Line exceeded [`MAX_LINE_LEN`]; bytes are discarded until the next newline
    TooLong,
    /// Line is not valid UTF-8
    InvalidUtf8,
}

impl core::fmt::Display for LineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LineError::TooLong => f.write_str("line too long"),
            LineError::InvalidUtf8 => f.write_str("line is not valid UTF-8"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LineError {}

/// Byte-fed accumulator that yields complete lines
#[derive(Debug, Clone, Default)]
pub struct LineParser {
    buffer: Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
}

impl LineParser {
    /// Create a new line parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any partial line
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Feed a single byte.
    ///
    /// Returns `Ok(Some(line))` on a terminator, `Ok(None)` when more bytes
    /// are needed. An overlong line reports `TooLong` once and the parser
    /// resynchronizes at the next terminator.
    pub fn feed(&mut self, byte: u8) -> Result<Option<String<MAX_LINE_LEN>>, LineError> {
        if byte == LINE_END {
            if self.overflowed {
                self.reset();
                return Ok(None);
            }
            let mut bytes = core::mem::take(&mut self.buffer);
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            return String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| LineError::InvalidUtf8);
        }

        if self.overflowed {
            return Ok(None);
        }

        if self.buffer.push(byte).is_err() {
            self.buffer.clear();
            self.overflowed = true;
            return Err(LineError::TooLong);
        }
        Ok(None)
    }

    /// Feed multiple bytes, returning the first complete line.
    ///
    /// Bytes after the first terminator are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Option<String<MAX_LINE_LEN>>, LineError> {
        for &byte in bytes {
            if let Some(line) = self.feed(byte)? {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}

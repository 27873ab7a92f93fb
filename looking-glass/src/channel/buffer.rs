//! Output buffer that cleans terminal noise as it accumulates.
//!
//! Bytes pass through a `vte` parser, so escape sequences (colours, cursor
//! movement) vanish even when they are split across reads. Carriage
//! returns are dropped and backspaces erase the previous character, which
//! leaves plain `\n`-separated text.
//!
//! Prompt detection only ever looks at the trailing, unterminated line:
//! that is where a CLI leaves its cursor once a command has finished.

use vte::{Parser, Perform};

/// Default cap on buffered output (8 MiB).
pub const DEFAULT_MAX_OUTPUT: usize = 8 * 1024 * 1024;

/// Accumulates cleaned device output.
pub struct OutputBuffer {
    /// Cleaned text received so far.
    text: String,

    /// Escape sequence parser; keeps state between chunks.
    parser: Parser,

    /// Size limit for `text`.
    max_len: usize,
}

impl OutputBuffer {
    /// Create a buffer holding at most `max_len` bytes of cleaned text.
    pub fn new(max_len: usize) -> Self {
        Self {
            text: String::with_capacity(4096),
            parser: Parser::new(),
            max_len,
        }
    }

    /// Feed raw bytes from the transport.
    pub fn extend(&mut self, data: &[u8]) {
        let mut printer = Printer {
            out: &mut self.text,
        };
        self.parser.advance(&mut printer, data);
    }

    /// Text after the last newline; the prompt candidate.
    pub fn last_line(&self) -> &str {
        match memchr::memrchr(b'\n', self.text.as_bytes()) {
            Some(pos) => &self.text[pos + 1..],
            None => &self.text,
        }
    }

    /// Whether the size limit has been exceeded.
    pub fn is_full(&self) -> bool {
        self.text.len() > self.max_len
    }

    /// The size limit.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Get the buffered text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    /// Drop everything buffered so far.
    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTPUT)
    }
}

/// `vte` performer that keeps printable text and line structure only.
struct Printer<'a> {
    out: &'a mut String,
}

impl Perform for Printer<'_> {
    fn print(&mut self, c: char) {
        self.out.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.out.push('\n'),
            b'\t' => self.out.push('\t'),
            // backspace never crosses a line boundary
            0x08 => {
                if !self.out.ends_with('\n') {
                    self.out.pop();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = OutputBuffer::new(100);
        buffer.extend(b"Hello, world!");
        assert_eq!(buffer.as_str(), "Hello, world!");
    }

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = OutputBuffer::new(100);
        buffer.extend(b"\x1b[32mGreen text\x1b[0m");
        assert_eq!(buffer.as_str(), "Green text");
    }

    #[test]
    fn test_escape_split_across_chunks() {
        let mut buffer = OutputBuffer::new(100);
        buffer.extend(b"abc\x1b[3");
        buffer.extend(b"2mdef");
        assert_eq!(buffer.as_str(), "abcdef");
    }

    #[test]
    fn test_carriage_returns_and_backspaces() {
        let mut buffer = OutputBuffer::new(100);
        buffer.extend(b"line one\r\nrouter#x\x08");
        assert_eq!(buffer.as_str(), "line one\nrouter#");
    }

    #[test]
    fn test_last_line() {
        let mut buffer = OutputBuffer::new(100);
        buffer.extend(b"show version\r\nCisco IOS\r\nrouter#");
        assert_eq!(buffer.last_line(), "router#");

        buffer.extend(b"\r\n");
        assert_eq!(buffer.last_line(), "");
    }

    #[test]
    fn test_size_limit() {
        let mut buffer = OutputBuffer::new(10);
        buffer.extend(&[b'x'; 10]);
        assert!(!buffer.is_full());
        buffer.extend(b"y");
        assert!(buffer.is_full());
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut buffer = OutputBuffer::new(100);
        buffer.extend(b"test data");
        assert_eq!(buffer.take(), "test data");
        assert!(buffer.is_empty());
    }
}

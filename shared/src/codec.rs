//! Buffer codec for the game client's tagged wire format
//!
//! Every message starts with a single tag byte. Strings are raw bytes ended by
//! a zero byte and numbers are fixed-width little-endian. Reads never fail:
//! a truncated buffer produces a best-effort value so a misbehaving client
//! cannot crash the reader.

/// Returns the tag byte of a buffer, or None if the buffer is empty
pub fn decode_tag(buf: &[u8]) -> Option<u8> {
    buf.first().copied()
}

/// Position of the first zero byte at or after `start`
pub fn find_terminator(buf: &[u8], start: usize) -> Option<usize> {
    buf.get(start..)?
        .iter()
        .position(|&b| b == 0)
        .map(|offset| start + offset)
}

/// Cursor-based reader over an inbound buffer
///
/// The cursor starts at 1 when created with `after_tag`, matching the layout
/// where the payload immediately follows the tag byte.
#[derive(Debug)]
pub struct BufferReader<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> BufferReader<'a> {
    /// Creates a reader positioned at the first byte
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    /// Creates a reader positioned just past the tag byte
    pub fn after_tag(buf: &'a [u8]) -> Self {
        Self {
            buf,
            cursor: 1.min(buf.len()),
        }
    }

    /// Offset of the next byte to read
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Bytes left between the cursor and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.cursor)
    }

    /// Reads a zero-terminated string, stopping at `limit` at the latest
    ///
    /// The cursor lands one past the terminator when one is found before
    /// `limit`, otherwise exactly at `limit`. `limit` is clamped to the
    /// buffer length. Invalid UTF-8 is replaced rather than rejected.
    pub fn read_string(&mut self, limit: usize) -> String {
        let limit = limit.min(self.buf.len());
        let start = self.cursor.min(limit);

        let (end, next) = match self.buf[start..limit].iter().position(|&b| b == 0) {
            Some(offset) => (start + offset, start + offset + 1),
            None => (limit, limit),
        };

        self.cursor = next;
        String::from_utf8_lossy(&self.buf[start..end]).into_owned()
    }

    /// Reads one unsigned byte, or None past the end of the buffer
    pub fn read_u8(&mut self) -> Option<u8> {
        let value = *self.buf.get(self.cursor)?;
        self.cursor += 1;
        Some(value)
    }

    /// Reads an unsigned little-endian 16-bit number
    pub fn read_u16_le(&mut self) -> Option<u16> {
        let bytes = self.buf.get(self.cursor..self.cursor + 2)?;
        self.cursor += 2;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

/// Growable writer for outbound messages
#[derive(Debug, Default)]
pub struct BufferWriter {
    buf: Vec<u8>,
}

impl BufferWriter {
    /// Creates an empty writer
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(32),
        }
    }

    /// Starts a message with its tag byte
    pub fn with_tag(tag: u8) -> Self {
        let mut writer = Self::new();
        writer.push_u8(tag);
        writer
    }

    /// Appends one byte
    pub fn push_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Appends a 16-bit number, low byte first
    pub fn push_u16_le(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends raw bytes unchanged
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes the string bytes followed by a zero terminator
    ///
    /// Interior zero bytes would end the string early on the receiving side,
    /// so the string is cut at the first one.
    pub fn push_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.buf.extend_from_slice(&bytes[..end]);
        self.buf.push(0);
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true before anything has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the writer and returns the encoded message
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tag() {
        assert_eq!(decode_tag(&[3, 104, 105, 0]), Some(3));
        assert_eq!(decode_tag(&[]), None);
    }

    #[test]
    fn test_read_terminated_string() {
        let buf = b"abc\0";
        let mut reader = BufferReader::new(buf);

        assert_eq!(reader.read_string(4), "abc");
        assert_eq!(reader.cursor(), 4);
    }

    #[test]
    fn test_read_unterminated_string_stops_at_limit() {
        let buf = b"abc";
        let mut reader = BufferReader::new(buf);

        assert_eq!(reader.read_string(3), "abc");
        assert_eq!(reader.cursor(), 3);
    }

    #[test]
    fn test_read_string_then_number() {
        let buf = [1, b'h', b'i', 0, 42];
        let mut reader = BufferReader::after_tag(&buf);

        assert_eq!(reader.read_string(buf.len()), "hi");
        assert_eq!(reader.read_u8(), Some(42));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_string_limit_beyond_buffer_is_clamped() {
        let buf = b"xy";
        let mut reader = BufferReader::new(buf);

        assert_eq!(reader.read_string(1024), "xy");
        assert_eq!(reader.cursor(), 2);
    }

    #[test]
    fn test_read_empty_string() {
        let buf = [0, 7];
        let mut reader = BufferReader::new(&buf);

        assert_eq!(reader.read_string(2), "");
        assert_eq!(reader.cursor(), 1);
        assert_eq!(reader.read_u8(), Some(7));
    }

    #[test]
    fn test_read_past_end_is_best_effort() {
        let buf = [9];
        let mut reader = BufferReader::after_tag(&buf);

        assert_eq!(reader.read_string(buf.len()), "");
        assert_eq!(reader.read_u8(), None);
        assert_eq!(reader.read_u16_le(), None);
        assert_eq!(reader.cursor(), 1);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let buf = [0xff, b'a', 0];
        let mut reader = BufferReader::new(&buf);

        assert_eq!(reader.read_string(3), "\u{fffd}a");
    }

    #[test]
    fn test_u16_little_endian() {
        let mut writer = BufferWriter::new();
        writer.push_u16_le(19238);
        let bytes = writer.finish();

        assert_eq!(bytes, vec![0x26, 0x4b]);
        assert_eq!(BufferReader::new(&bytes).read_u16_le(), Some(19238));
    }

    #[test]
    fn test_push_string_appends_terminator() {
        let mut writer = BufferWriter::with_tag(3);
        writer.push_string("hello");

        assert_eq!(writer.finish(), b"\x03hello\0".to_vec());
    }

    #[test]
    fn test_push_string_cuts_interior_zero() {
        let mut writer = BufferWriter::new();
        writer.push_string("ab\0cd");

        assert_eq!(writer.finish(), b"ab\0".to_vec());
    }

    #[test]
    fn test_find_terminator() {
        assert_eq!(find_terminator(b"\x03ab\0", 1), Some(3));
        assert_eq!(find_terminator(b"\x03ab", 1), None);
        assert_eq!(find_terminator(b"", 5), None);
    }
}

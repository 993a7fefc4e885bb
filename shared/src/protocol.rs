//! Message types and tag values shared with the game client
//!
//! Tags are one byte. The two directions use separate namespaces: a tag the
//! client sends is only interpreted by the server and vice versa. A request
//! and its response share a value (`GET_REQUESTNUM` and `SEND_REQUESTED_NUM`
//! are both 2) so the client's macro table stays easy to read.

use crate::codec::{decode_tag, find_terminator, BufferReader, BufferWriter};
use crate::ProtocolError;

/// Tags of messages sent by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientTag {
    /// String followed by an unsigned byte, logged by the server
    TestMessage = 1,
    /// No payload, answered with `ServerTag::RequestedNumber`
    RequestNumber = 2,
    /// String to broadcast to every connected client
    Chat = 3,
}

impl ClientTag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(ClientTag::TestMessage),
            2 => Some(ClientTag::RequestNumber),
            3 => Some(ClientTag::Chat),
            _ => None,
        }
    }
}

/// Tags of messages sent by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerTag {
    Kick = 1,
    RequestedNumber = 2,
    Broadcast = 3,
}

impl ServerTag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(ServerTag::Kick),
            2 => Some(ServerTag::RequestedNumber),
            3 => Some(ServerTag::Broadcast),
            _ => None,
        }
    }
}

/// A decoded client-to-server message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    TestMessage { text: String, number: u8 },
    RequestNumber,
    Chat { text: String },
    /// A tag the server does not know; carries whatever followed it
    Unknown { tag: u8, payload: Vec<u8> },
}

/// A decoded server-to-client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Kick { reason: String },
    RequestedNumber(u16),
    Broadcast { text: String },
    Unknown { tag: u8, payload: Vec<u8> },
}

/// Outcome of trying to parse one frame from the front of a buffer
#[derive(Debug, PartialEq, Eq)]
pub enum Parsed<M> {
    /// A whole message, occupying the first `consumed` bytes
    Complete { message: M, consumed: usize },
    /// More bytes are needed
    Incomplete,
    /// The first `consumed` bytes cannot form a message and must be dropped
    ///
    /// The rest of the broken message is still in the stream: everything up
    /// to and including the next zero byte, then `trailing` more bytes.
    Malformed {
        error: ProtocolError,
        consumed: usize,
        trailing: usize,
    },
}

/// A message type that can be framed on the wire
pub trait WireMessage: Sized {
    /// Parses one message from the front of `buf`
    ///
    /// `max_frame_len` bounds how many bytes may be buffered while waiting for
    /// a string terminator.
    fn parse(buf: &[u8], max_frame_len: usize) -> Parsed<Self>;

    fn encode(&self) -> Vec<u8>;
}

enum FrameEnd {
    Ready(usize),
    Pending,
    TooLong,
}

/// Locates the end of a frame made of a tag, one string and `trailing` fixed bytes
fn string_frame_end(buf: &[u8], trailing: usize, max_frame_len: usize) -> FrameEnd {
    match find_terminator(buf, 1) {
        Some(terminator) => {
            let end = terminator + 1 + trailing;
            if buf.len() >= end {
                FrameEnd::Ready(end)
            } else {
                FrameEnd::Pending
            }
        }
        None if buf.len() >= max_frame_len => FrameEnd::TooLong,
        None => FrameEnd::Pending,
    }
}

/// Drops an oversized string frame
///
/// Its tail is still on the way, so the decoder has to skip up to the
/// terminator and any fixed-width fields after it before parsing again.
fn too_long<M>(tag: u8, buf: &[u8], trailing: usize) -> Parsed<M> {
    Parsed::Malformed {
        error: ProtocolError::Malformed {
            tag,
            reason: "string terminator missing within frame limit",
        },
        consumed: buf.len(),
        trailing,
    }
}

impl WireMessage for ClientMessage {
    fn parse(buf: &[u8], max_frame_len: usize) -> Parsed<Self> {
        let Some(tag) = decode_tag(buf) else {
            return Parsed::Incomplete;
        };

        match ClientTag::from_byte(tag) {
            Some(ClientTag::RequestNumber) => Parsed::Complete {
                message: ClientMessage::RequestNumber,
                consumed: 1,
            },
            Some(ClientTag::Chat) => match string_frame_end(buf, 0, max_frame_len) {
                FrameEnd::Ready(end) => {
                    let mut reader = BufferReader::after_tag(&buf[..end]);
                    let text = reader.read_string(end);
                    Parsed::Complete {
                        message: ClientMessage::Chat { text },
                        consumed: end,
                    }
                }
                FrameEnd::Pending => Parsed::Incomplete,
                FrameEnd::TooLong => too_long(tag, buf, 0),
            },
            Some(ClientTag::TestMessage) => match string_frame_end(buf, 1, max_frame_len) {
                FrameEnd::Ready(end) => {
                    let mut reader = BufferReader::after_tag(&buf[..end]);
                    let text = reader.read_string(end);
                    let number = reader.read_u8().unwrap_or_default();
                    Parsed::Complete {
                        message: ClientMessage::TestMessage { text, number },
                        consumed: end,
                    }
                }
                FrameEnd::Pending => Parsed::Incomplete,
                FrameEnd::TooLong => too_long(tag, buf, 1),
            },
            // Length is unknowable, so everything buffered belongs to it
            None => Parsed::Complete {
                message: ClientMessage::Unknown {
                    tag,
                    payload: buf[1..].to_vec(),
                },
                consumed: buf.len(),
            },
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            ClientMessage::TestMessage { text, number } => {
                let mut writer = BufferWriter::with_tag(ClientTag::TestMessage as u8);
                writer.push_string(text);
                writer.push_u8(*number);
                writer.finish()
            }
            ClientMessage::RequestNumber => vec![ClientTag::RequestNumber as u8],
            ClientMessage::Chat { text } => {
                let mut writer = BufferWriter::with_tag(ClientTag::Chat as u8);
                writer.push_string(text);
                writer.finish()
            }
            ClientMessage::Unknown { tag, payload } => {
                let mut writer = BufferWriter::with_tag(*tag);
                writer.push_bytes(payload);
                writer.finish()
            }
        }
    }
}

impl WireMessage for ServerMessage {
    fn parse(buf: &[u8], max_frame_len: usize) -> Parsed<Self> {
        let Some(tag) = decode_tag(buf) else {
            return Parsed::Incomplete;
        };

        match ServerTag::from_byte(tag) {
            Some(ServerTag::RequestedNumber) => {
                let mut reader = BufferReader::after_tag(buf);
                match reader.read_u16_le() {
                    Some(number) => Parsed::Complete {
                        message: ServerMessage::RequestedNumber(number),
                        consumed: reader.cursor(),
                    },
                    None => Parsed::Incomplete,
                }
            }
            Some(kind @ (ServerTag::Kick | ServerTag::Broadcast)) => {
                match string_frame_end(buf, 0, max_frame_len) {
                    FrameEnd::Ready(end) => {
                        let text = BufferReader::after_tag(&buf[..end]).read_string(end);
                        let message = if kind == ServerTag::Kick {
                            ServerMessage::Kick { reason: text }
                        } else {
                            ServerMessage::Broadcast { text }
                        };
                        Parsed::Complete {
                            message,
                            consumed: end,
                        }
                    }
                    FrameEnd::Pending => Parsed::Incomplete,
                    FrameEnd::TooLong => too_long(tag, buf, 0),
                }
            }
            None => Parsed::Complete {
                message: ServerMessage::Unknown {
                    tag,
                    payload: buf[1..].to_vec(),
                },
                consumed: buf.len(),
            },
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            ServerMessage::Kick { reason } => {
                let mut writer = BufferWriter::with_tag(ServerTag::Kick as u8);
                writer.push_string(reason);
                writer.finish()
            }
            ServerMessage::RequestedNumber(number) => {
                let mut writer = BufferWriter::with_tag(ServerTag::RequestedNumber as u8);
                writer.push_u16_le(*number);
                writer.finish()
            }
            ServerMessage::Broadcast { text } => {
                let mut writer = BufferWriter::with_tag(ServerTag::Broadcast as u8);
                writer.push_string(text);
                writer.finish()
            }
            ServerMessage::Unknown { tag, payload } => {
                let mut writer = BufferWriter::with_tag(*tag);
                writer.push_bytes(payload);
                writer.finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_FRAME_LEN;

    #[test]
    fn test_tag_lookup() {
        assert_eq!(ClientTag::from_byte(1), Some(ClientTag::TestMessage));
        assert_eq!(ClientTag::from_byte(2), Some(ClientTag::RequestNumber));
        assert_eq!(ClientTag::from_byte(3), Some(ClientTag::Chat));
        assert_eq!(ClientTag::from_byte(0), None);
        assert_eq!(ServerTag::from_byte(2), Some(ServerTag::RequestedNumber));
        assert_eq!(ServerTag::from_byte(200), None);
    }

    #[test]
    fn test_parse_request_number_ignores_trailing_bytes() {
        let parsed = ClientMessage::parse(&[2, 2], MAX_FRAME_LEN);
        assert_eq!(
            parsed,
            Parsed::Complete {
                message: ClientMessage::RequestNumber,
                consumed: 1
            }
        );
    }

    #[test]
    fn test_parse_test_message() {
        let parsed = ClientMessage::parse(b"\x01ping\0\x07", MAX_FRAME_LEN);
        assert_eq!(
            parsed,
            Parsed::Complete {
                message: ClientMessage::TestMessage {
                    text: "ping".to_string(),
                    number: 7
                },
                consumed: 7
            }
        );
    }

    #[test]
    fn test_parse_test_message_waits_for_number() {
        assert_eq!(
            ClientMessage::parse(b"\x01ping\0", MAX_FRAME_LEN),
            Parsed::Incomplete
        );
    }

    #[test]
    fn test_parse_chat_waits_for_terminator() {
        assert_eq!(
            ClientMessage::parse(b"\x03hel", MAX_FRAME_LEN),
            Parsed::Incomplete
        );
        assert_eq!(ClientMessage::parse(&[], MAX_FRAME_LEN), Parsed::Incomplete);
    }

    #[test]
    fn test_parse_chat_over_limit_is_malformed() {
        let mut buf = vec![3];
        buf.extend(std::iter::repeat(b'a').take(15));

        match ClientMessage::parse(&buf, 16) {
            Parsed::Malformed {
                error,
                consumed,
                trailing,
            } => {
                assert_eq!(consumed, 16);
                assert_eq!(trailing, 0);
                assert_eq!(
                    error,
                    ProtocolError::Malformed {
                        tag: 3,
                        reason: "string terminator missing within frame limit"
                    }
                );
            }
            other => panic!("Expected malformed frame, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_test_message_still_owes_its_number() {
        let buf = b"\x01abcdefg";

        match ClientMessage::parse(buf, 8) {
            Parsed::Malformed {
                consumed, trailing, ..
            } => {
                assert_eq!(consumed, 8);
                assert_eq!(trailing, 1);
            }
            other => panic!("Expected malformed frame, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_tag_takes_everything() {
        let parsed = ClientMessage::parse(&[99, 1, 2, 3], MAX_FRAME_LEN);
        assert_eq!(
            parsed,
            Parsed::Complete {
                message: ClientMessage::Unknown {
                    tag: 99,
                    payload: vec![1, 2, 3]
                },
                consumed: 4
            }
        );
    }

    #[test]
    fn test_encode_server_messages() {
        assert_eq!(
            ServerMessage::Kick {
                reason: "Full Server".to_string()
            }
            .encode(),
            b"\x01Full Server\0".to_vec()
        );
        assert_eq!(
            ServerMessage::RequestedNumber(19238).encode(),
            vec![2, 0x26, 0x4b]
        );
        assert_eq!(
            ServerMessage::Broadcast {
                text: "hello".to_string()
            }
            .encode(),
            b"\x03hello\0".to_vec()
        );
    }

    #[test]
    fn test_parse_requested_number_needs_two_bytes() {
        assert_eq!(
            ServerMessage::parse(&[2, 0x26], MAX_FRAME_LEN),
            Parsed::Incomplete
        );
        assert_eq!(
            ServerMessage::parse(&[2, 0x26, 0x4b], MAX_FRAME_LEN),
            Parsed::Complete {
                message: ServerMessage::RequestedNumber(19238),
                consumed: 3
            }
        );
    }

    #[test]
    fn test_encoded_chat_parses_back() {
        let message = ClientMessage::Chat {
            text: "gg wp".to_string(),
        };
        let bytes = message.encode();
        assert_eq!(
            ClientMessage::parse(&bytes, MAX_FRAME_LEN),
            Parsed::Complete {
                message,
                consumed: bytes.len()
            }
        );
    }
}

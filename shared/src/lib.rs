//! Wire protocol shared by the relay server and client
//!
//! Messages are a one-byte tag followed by a payload made of zero-terminated
//! strings and little-endian fixed-width numbers. The format is dictated by
//! the game client, so nothing here carries a length prefix.

pub mod codec;
pub mod framing;
pub mod protocol;

pub use codec::{decode_tag, BufferReader, BufferWriter};
pub use framing::FrameDecoder;
pub use protocol::{ClientMessage, ClientTag, Parsed, ServerMessage, ServerTag, WireMessage};

/// Largest number of bytes buffered for a single inbound frame
pub const MAX_FRAME_LEN: usize = 1024;

/// Default port the server listens on
pub const DEFAULT_PORT: u16 = 8080;

/// Default capacity of the client registry
pub const MAX_CLIENTS: usize = 8;

/// Number sent in reply to `ClientTag::RequestNumber`
pub const REQUESTED_NUMBER: u16 = 19238;

/// Reason sent with the kick message when the server is full
pub const FULL_SERVER_REASON: &str = "Full Server";

/// Errors raised while decoding frames
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message with tag {tag}: {reason}")]
    Malformed { tag: u8, reason: &'static str },
}

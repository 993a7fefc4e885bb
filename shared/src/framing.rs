//! Incremental framing over a byte stream
//!
//! TCP gives no guarantee that one read holds exactly one message. The decoder
//! keeps whatever has arrived and hands out messages only once they are whole,
//! so a message split over several reads, or several messages coalesced into
//! one read, decode the same way.

use crate::protocol::{Parsed, WireMessage};
use crate::{ProtocolError, MAX_FRAME_LEN};
use bytes::{Buf, BytesMut};
use std::marker::PhantomData;

/// Remainder of a dropped message that has not arrived yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discard {
    /// Skip through the next zero byte, then `trailing` more bytes
    UntilTerminator { trailing: usize },
    /// Skip this many more bytes
    Bytes(usize),
}

/// Per-connection frame decoder
#[derive(Debug)]
pub struct FrameDecoder<M> {
    pending: BytesMut,
    max_frame_len: usize,
    /// Set while the tail of an oversized message is still being skipped
    discard: Option<Discard>,
    _message: PhantomData<fn() -> M>,
}

impl<M: WireMessage> FrameDecoder<M> {
    /// Creates a decoder with the default frame limit
    pub fn new() -> Self {
        Self::with_max_frame_len(MAX_FRAME_LEN)
    }

    /// Creates a decoder that gives up on a string after `max_frame_len` bytes
    ///
    /// The limit is raised to 2 if smaller, since a tag byte and a terminator
    /// are the least a string frame can hold.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            pending: BytesMut::with_capacity(max_frame_len.max(2)),
            max_frame_len: max_frame_len.max(2),
            discard: None,
            _message: PhantomData,
        }
    }

    /// Appends freshly read bytes
    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Takes the next whole message off the front of the buffer
    ///
    /// Returns None once no complete message is buffered. A malformed frame
    /// is reported once. Its remaining bytes are then skipped as they arrive,
    /// so the message after it decodes normally.
    pub fn next_frame(&mut self) -> Option<Result<M, ProtocolError>> {
        if !self.skip_discarded() {
            return None;
        }

        match M::parse(&self.pending, self.max_frame_len) {
            Parsed::Complete { message, consumed } => {
                self.pending.advance(consumed);
                Some(Ok(message))
            }
            Parsed::Incomplete => None,
            Parsed::Malformed {
                error,
                consumed,
                trailing,
            } => {
                self.pending.advance(consumed);
                self.discard = Some(Discard::UntilTerminator { trailing });
                Some(Err(error))
            }
        }
    }

    /// Drops buffered bytes that belong to an already rejected message
    ///
    /// Returns true once the buffer starts at a message boundary.
    fn skip_discarded(&mut self) -> bool {
        loop {
            match self.discard {
                None => return true,
                Some(Discard::UntilTerminator { trailing }) => {
                    match self.pending.iter().position(|&b| b == 0) {
                        Some(terminator) => {
                            self.pending.advance(terminator + 1);
                            self.discard = (trailing > 0).then_some(Discard::Bytes(trailing));
                        }
                        None => {
                            self.pending.clear();
                            return false;
                        }
                    }
                }
                Some(Discard::Bytes(count)) => {
                    let skipped = count.min(self.pending.len());
                    self.pending.advance(skipped);
                    if skipped < count {
                        self.discard = Some(Discard::Bytes(count - skipped));
                        return false;
                    }
                    self.discard = None;
                }
            }
        }
    }

    /// Number of bytes waiting for the rest of their frame
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the tail of a dropped message is still being skipped
    pub fn is_discarding(&self) -> bool {
        self.discard.is_some()
    }
}

impl<M: WireMessage> Default for FrameDecoder<M> {
    fn default() -> Self {
        Self::new()
    }
}

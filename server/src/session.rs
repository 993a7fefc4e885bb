//! Per-connection read loop
//!
//! A session starts once its connection has been admitted. It reads until the
//! peer closes or the read fails, feeding every read through a frame decoder
//! and dispatching each whole message in arrival order. Leaving the loop
//! removes the connection from the registry exactly once.

use crate::client_manager::Peer;
use crate::dispatcher::Dispatcher;
use log::{debug, info, warn};
use shared::{ClientMessage, FrameDecoder};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of the buffer each read fills
pub const READ_BUFFER_SIZE: usize = 1024;

/// Why a session stopped reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed its side of the connection
    PeerClosed,
    /// A read failed with the given error kind
    ReadError(io::ErrorKind),
}

/// Read side of one admitted connection
pub struct Session<R> {
    peer: Arc<Peer>,
    reader: R,
    decoder: FrameDecoder<ClientMessage>,
    dispatcher: Arc<Dispatcher>,
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(
        peer: Arc<Peer>,
        reader: R,
        dispatcher: Arc<Dispatcher>,
        max_frame_len: usize,
    ) -> Self {
        Self {
            peer,
            reader,
            decoder: FrameDecoder::with_max_frame_len(max_frame_len),
            dispatcher,
        }
    }

    /// Runs the read loop to completion and deregisters the connection
    pub async fn run(mut self) -> SessionEnd {
        let end = self.read_loop().await;

        let removed = {
            let mut clients = self.dispatcher.clients().write().await;
            clients.remove(self.peer.id())
        };
        if !removed {
            warn!("Client {} was already deregistered", self.peer.id());
        }

        if let Err(e) = self.peer.shutdown().await {
            debug!("Shutdown of client {} failed: {}", self.peer.id(), e);
        }

        end
    }

    async fn read_loop(&mut self) -> SessionEnd {
        let mut buf = [0u8; READ_BUFFER_SIZE];

        loop {
            match self.reader.read(&mut buf).await {
                Ok(0) => {
                    info!("Client {} closed the connection", self.peer.id());
                    return SessionEnd::PeerClosed;
                }
                Ok(len) => {
                    self.decoder.push(&buf[..len]);
                    self.dispatch_pending().await;
                }
                Err(e) => {
                    warn!("Error reading from client {}: {}", self.peer.id(), e);
                    return SessionEnd::ReadError(e.kind());
                }
            }
        }
    }

    /// Dispatches every whole message currently buffered
    async fn dispatch_pending(&mut self) {
        while let Some(frame) = self.decoder.next_frame() {
            match frame {
                Ok(message) => {
                    if let Err(e) = self.dispatcher.dispatch(&self.peer, message).await {
                        warn!("Failed to reply to client {}: {}", self.peer.id(), e);
                    }
                }
                Err(e) => {
                    warn!("Dropping message from client {}: {}", self.peer.id(), e);
                }
            }
        }
    }
}

//! # Relay Client Library
//!
//! A small client for the relay server that speaks the same tagged protocol as
//! the game. It is used to poke a running server by hand and by the
//! end-to-end tests.
//!
//! A connection is split in two: [`RelayClient`] sends messages and
//! [`EventStream`] yields what the server sends back. The two halves can live
//! in different tasks.
//!
//! ```rust,no_run
//! use client::RelayClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (mut client, mut events) = RelayClient::connect("127.0.0.1:8080").await?;
//!     client.chat("hello").await?;
//!
//!     while let Some(message) = events.next_message().await? {
//!         println!("{:?}", message);
//!     }
//!     Ok(())
//! }
//! ```

use log::{info, warn};
use shared::{ClientMessage, FrameDecoder, ServerMessage, WireMessage};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Errors raised by the relay client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] shared::ProtocolError),
}

/// Sending half of a connection to the relay server
pub struct RelayClient {
    writer: OwnedWriteHalf,
}

impl RelayClient {
    /// Connects and splits the stream into a sender and an event stream
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<(RelayClient, EventStream)> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", stream.peer_addr()?);

        let (reader, writer) = stream.into_split();
        Ok((RelayClient { writer }, EventStream::new(reader)))
    }

    pub async fn send(&mut self, message: &ClientMessage) -> io::Result<()> {
        self.send_raw(&message.encode()).await
    }

    /// Writes bytes as-is, for exercising framing edge cases
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await
    }

    /// Asks the server to broadcast `text` to every connected client
    pub async fn chat(&mut self, text: &str) -> io::Result<()> {
        self.send(&ClientMessage::Chat {
            text: text.to_string(),
        })
        .await
    }

    pub async fn test_message(&mut self, text: &str, number: u8) -> io::Result<()> {
        self.send(&ClientMessage::TestMessage {
            text: text.to_string(),
            number,
        })
        .await
    }

    pub async fn request_number(&mut self) -> io::Result<()> {
        self.send(&ClientMessage::RequestNumber).await
    }

    /// Closes the sending direction; the server sees end of stream
    pub async fn close(mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}

/// Receiving half of a connection to the relay server
pub struct EventStream {
    reader: OwnedReadHalf,
    decoder: FrameDecoder<ServerMessage>,
    buf: Vec<u8>,
}

impl EventStream {
    fn new(reader: OwnedReadHalf) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::new(),
            buf: vec![0u8; 1024],
        }
    }

    /// Waits for the next whole message from the server
    ///
    /// Returns Ok(None) once the server has closed the connection. Bytes of
    /// an incomplete message left at that point are discarded.
    pub async fn next_message(&mut self) -> Result<Option<ServerMessage>, ClientError> {
        loop {
            if let Some(frame) = self.decoder.next_frame() {
                return Ok(Some(frame?));
            }

            let len = self.reader.read(&mut self.buf).await?;
            if len == 0 {
                if self.decoder.pending_len() > 0 {
                    warn!(
                        "Server closed with {} bytes of an incomplete message",
                        self.decoder.pending_len()
                    );
                }
                return Ok(None);
            }
            self.decoder.push(&self.buf[..len]);
        }
    }
}

/// A line typed by the user, mapped onto a protocol action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(ClientMessage),
    Quit,
}

/// Parses one input line
///
/// `/num` requests a number, `/test <n> <text>` sends a test message and
/// `/quit` exits. Anything else is sent as chat. Blank lines yield None.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    let mut words = line.splitn(3, ' ');
    match words.next() {
        Some("/quit") => Some(Command::Quit),
        Some("/num") => Some(Command::Send(ClientMessage::RequestNumber)),
        Some("/test") => {
            let number = words.next().and_then(|n| n.parse::<u8>().ok());
            match number {
                Some(number) => Some(Command::Send(ClientMessage::TestMessage {
                    text: words.next().unwrap_or_default().to_string(),
                    number,
                })),
                None => Some(Command::Send(ClientMessage::Chat {
                    text: line.to_string(),
                })),
            }
        }
        _ => Some(Command::Send(ClientMessage::Chat {
            text: line.to_string(),
        })),
    }
}

/// Renders a server message for the terminal
pub fn describe(message: &ServerMessage) -> String {
    match message {
        ServerMessage::Kick { reason } => format!("Kicked by server: {}", reason),
        ServerMessage::RequestedNumber(number) => format!("Server number: {}", number),
        ServerMessage::Broadcast { text } => format!("> {}", text),
        ServerMessage::Unknown { tag, payload } => {
            format!("Unknown message tag {} ({} bytes)", tag, payload.len())
        }
    }
}

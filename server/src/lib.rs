//! # Relay Server Library
//!
//! TCP relay for a real-time game client speaking a tagged binary protocol.
//! The server admits a bounded number of connections, decodes the one-byte
//! tag + payload messages they send, and answers or rebroadcasts them.
//!
//! ## Core Responsibilities
//!
//! ### Admission
//! Every accepted connection is checked against the registry capacity. A
//! connection that does not fit is sent a kick message with a short reason
//! and closed without ever being read from.
//!
//! ### Framing
//! Inbound bytes are buffered per connection until a whole message is
//! available, so messages split across reads or packed into one read are
//! handled the same way.
//!
//! ### Broadcasting
//! Chat messages are written to every registered connection, the sender
//! included. A peer whose write fails is skipped and logged. The others
//! still receive the message.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! The bounded registry of admitted connections and their write handles.
//!
//! ### Dispatcher Module (`dispatcher`)
//! Maps each decoded message to its single protocol action.
//!
//! ### Session Module (`session`)
//! The read loop owned by each admitted connection, including
//! deregistration when the connection ends.
//!
//! ### Network Module (`network`)
//! Listening socket, accept loop and the rejection path.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:8080".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::bind(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod dispatcher;
pub mod network;
pub mod session;

use shared::{DEFAULT_PORT, MAX_CLIENTS, MAX_FRAME_LEN, REQUESTED_NUMBER};

/// Runtime settings for the relay server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to, as `host:port`
    pub bind_addr: String,
    /// Maximum number of concurrently admitted clients
    pub max_clients: usize,
    /// Number sent back to clients that request one
    pub requested_number: u16,
    /// Bytes a single inbound frame may occupy while incomplete
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_clients: MAX_CLIENTS,
            requested_number: REQUESTED_NUMBER,
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

/// Errors surfaced by the server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

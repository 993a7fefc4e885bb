//! Connected client tracking and admission control for the relay server
//!
//! This module handles the server-side bookkeeping of connections:
//! - Per-connection write handles that keep whole messages from interleaving
//! - Capacity-checked admission of new connections
//! - Removal when a connection's session ends
//! - Enumeration of current members for broadcasting
//!
//! The manager itself is not synchronised. The server shares it as
//! `Arc<RwLock<ClientManager>>` so admission and removal hold the write guard
//! while broadcasts only hold the read guard long enough to collect the peers.

use log::info;
use shared::ServerMessage;
use shared::WireMessage;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};

/// Identity of a connection, unique among live connections
pub type ConnectionId = u64;

/// Registry handle shared between the accept loop and every session
pub type SharedClients = Arc<RwLock<ClientManager>>;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write side of one connection
///
/// The read side is owned by the connection's session. The writer sits
/// behind its own lock so that a reply from the owning session and a
/// broadcast from another session never mix their bytes.
pub struct Peer {
    id: ConnectionId,
    addr: SocketAddr,
    writer: Mutex<BoxedWriter>,
}

impl Peer {
    /// Wraps the write half of a connection
    pub fn new<W>(id: ConnectionId, addr: SocketAddr, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id,
            addr,
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Connection id assigned by the accept loop
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address of the connection
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Encodes and writes one message
    pub async fn send(&self, message: &ServerMessage) -> io::Result<()> {
        self.send_bytes(&message.encode()).await
    }

    /// Writes an already encoded message in one piece
    pub async fn send_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }

    /// Closes the write direction of the connection
    pub async fn shutdown(&self) -> io::Result<()> {
        self.writer.lock().await.shutdown().await
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

/// A registered connection and the state attached to it
#[derive(Debug)]
pub struct Client {
    pub peer: Arc<Peer>,
    /// When the connection was admitted
    pub connected_at: Instant,
    /// Display name, unset until something assigns one
    pub username: Option<String>,
}

impl Client {
    /// Creates an entry stamped with the current time and no username
    pub fn new(peer: Arc<Peer>) -> Self {
        Self {
            peer,
            connected_at: Instant::now(),
            username: None,
        }
    }
}

/// Bounded set of admitted connections
#[derive(Debug)]
pub struct ClientManager {
    /// Connected clients indexed by connection id
    clients: HashMap<ConnectionId, Client>,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Wraps a new manager in the lock the server shares it through
    pub fn shared(max_clients: usize) -> SharedClients {
        Arc::new(RwLock::new(Self::new(max_clients)))
    }

    /// Admits a connection if there is room
    ///
    /// Returns false without touching the registry when the server is at
    /// capacity. Callers hold the write guard, which makes the capacity
    /// check and the insert a single step with respect to other admissions.
    pub fn try_admit(&mut self, peer: Arc<Peer>) -> bool {
        if self.clients.len() >= self.max_clients {
            return false;
        }

        info!("Client {} connected from {}", peer.id(), peer.addr());
        self.clients.insert(peer.id(), Client::new(peer));
        true
    }

    /// Removes a connection, returning whether it was registered
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        if let Some(client) = self.clients.remove(&id) {
            info!(
                "Client {} disconnected after {:.1?}",
                id,
                client.connected_at.elapsed()
            );
            true
        } else {
            false
        }
    }

    /// Calls `f` once per registered connection, in no particular order
    pub fn for_each_peer<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Peer>),
    {
        for client in self.clients.values() {
            f(&client.peer);
        }
    }

    /// Whether `id` is currently registered
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Maximum number of concurrent clients
    pub fn capacity(&self) -> usize {
        self.max_clients
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true when no client is connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

//! Server network layer: TCP accept loop and admission

use crate::client_manager::{ClientManager, ConnectionId, Peer, SharedClients};
use crate::dispatcher::Dispatcher;
use crate::session::Session;
use crate::{ServerConfig, ServerError};
use log::{debug, error, info, warn};
use shared::{ServerMessage, FULL_SERVER_REASON};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::net::{TcpListener, TcpStream};

/// Relay server owning the listening socket and the client registry
pub struct Server {
    listener: TcpListener,
    clients: SharedClients,
    dispatcher: Arc<Dispatcher>,
    max_frame_len: usize,
    next_connection_id: ConnectionId,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        let clients = ClientManager::shared(config.max_clients);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&clients),
            config.requested_number,
        ));

        Ok(Server {
            listener,
            clients,
            dispatcher,
            max_frame_len: config.max_frame_len,
            next_connection_id: 1,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the registry, shared with every session
    pub fn clients(&self) -> SharedClients {
        Arc::clone(&self.clients)
    }

    /// Accepts connections until the task is dropped
    ///
    /// Failed accepts are logged and retried after a short pause. Nothing a
    /// single connection does can end this loop.
    pub async fn run(mut self) -> Result<(), ServerError> {
        info!("Server started successfully");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => self.handle_connection(stream, addr).await,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    /// Runs admission for a fresh connection and starts its task
    async fn handle_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        debug!("New connection {} from {}", id, addr);

        let (reader, writer) = stream.into_split();
        let peer = Arc::new(Peer::new(id, addr, writer));

        let admitted = {
            let mut clients = self.clients.write().await;
            clients.try_admit(Arc::clone(&peer))
        };

        if admitted {
            let session = Session::new(
                peer,
                reader,
                Arc::clone(&self.dispatcher),
                self.max_frame_len,
            );
            tokio::spawn(async move {
                let end = session.run().await;
                debug!("Session {} ended: {:?}", id, end);
            });
        } else {
            info!("Client tried to connect on full server from {}", addr);
            tokio::spawn(reject(peer, reader));
        }
    }
}

/// Tells a refused connection why and closes it without reading from it
///
/// The read half stays alive until the kick is written so the socket is not
/// torn down underneath the write.
pub async fn reject<R>(peer: Arc<Peer>, reader: R)
where
    R: AsyncRead + Unpin,
{
    let kick = ServerMessage::Kick {
        reason: FULL_SERVER_REASON.to_string(),
    };
    if let Err(e) = peer.send(&kick).await {
        warn!("Failed to kick connection {}: {}", peer.id(), e);
    }
    if let Err(e) = peer.shutdown().await {
        debug!("Shutdown of connection {} failed: {}", peer.id(), e);
    }
    drop(reader);
}

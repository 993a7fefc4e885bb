//! Protocol actions for decoded client messages

use crate::client_manager::{Peer, SharedClients};
use crate::ServerError;
use futures::future::join_all;
use log::{debug, info, warn};
use shared::{ClientMessage, ServerMessage, WireMessage};
use std::sync::Arc;

/// Delivery tally of one broadcast
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// What a dispatched message caused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Logged,
    Replied,
    Broadcast(BroadcastReport),
    Ignored,
}

/// Performs exactly one protocol action per message
///
/// Holds no per-connection state. The only shared state it touches is the
/// registry, read when fanning a chat message out.
#[derive(Debug)]
pub struct Dispatcher {
    clients: SharedClients,
    requested_number: u16,
}

impl Dispatcher {
    /// Creates a dispatcher that replies to `RequestNumber` with `requested_number`
    pub fn new(clients: SharedClients, requested_number: u16) -> Self {
        Self {
            clients,
            requested_number,
        }
    }

    /// Registry the dispatcher broadcasts to
    pub fn clients(&self) -> &SharedClients {
        &self.clients
    }

    /// Handles one message received from `origin`
    ///
    /// Only a failed reply to `origin` is returned as an error. Broadcast
    /// failures are confined to the peer they happened on.
    pub async fn dispatch(
        &self,
        origin: &Peer,
        message: ClientMessage,
    ) -> Result<DispatchOutcome, ServerError> {
        match message {
            ClientMessage::TestMessage { text, number } => {
                info!("Client {} sent test message: {:?}", origin.id(), text);
                info!("Client {} sent test number: {}", origin.id(), number);
                Ok(DispatchOutcome::Logged)
            }
            ClientMessage::RequestNumber => {
                origin
                    .send(&ServerMessage::RequestedNumber(self.requested_number))
                    .await?;
                Ok(DispatchOutcome::Replied)
            }
            ClientMessage::Chat { text } => {
                info!("Client {} broadcasting: {:?}", origin.id(), text);
                let report = self.broadcast(&ServerMessage::Broadcast { text }).await;
                Ok(DispatchOutcome::Broadcast(report))
            }
            ClientMessage::Unknown { tag, payload } => {
                debug!(
                    "Ignoring unknown tag {} from client {} ({} payload bytes)",
                    tag,
                    origin.id(),
                    payload.len()
                );
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    /// Sends a message to every registered connection, the sender included
    ///
    /// The peers are collected first so the registry lock is not held while
    /// writing. Writes run concurrently and one failing peer does not
    /// stop delivery to the others.
    pub async fn broadcast(&self, message: &ServerMessage) -> BroadcastReport {
        let mut peers = Vec::new();
        self.clients
            .read()
            .await
            .for_each_peer(|peer| peers.push(Arc::clone(peer)));

        let bytes = message.encode();
        let results = join_all(peers.iter().map(|peer| {
            let bytes = &bytes;
            async move { (peer.id(), peer.send_bytes(bytes).await) }
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (id, result) in results {
            match result {
                Ok(()) => {
                    debug!("Delivered broadcast to client {}", id);
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!("Failed to broadcast to client {}: {}", id, e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_manager::{ClientManager, ConnectionId};
    use shared::{FrameDecoder, REQUESTED_NUMBER};
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    /// Registers a peer backed by an in-memory pipe and returns the far end
    async fn register(clients: &SharedClients, id: ConnectionId) -> (Arc<Peer>, DuplexStream) {
        let (writer, far_end) = tokio::io::duplex(1024);
        let peer = Arc::new(Peer::new(id, test_addr(), writer));
        assert!(clients.write().await.try_admit(Arc::clone(&peer)));
        (peer, far_end)
    }

    async fn read_messages(far_end: &mut DuplexStream) -> Vec<ServerMessage> {
        let mut buf = vec![0u8; 256];
        let len = far_end.read(&mut buf).await.unwrap();
        let mut decoder = FrameDecoder::<ServerMessage>::new();
        decoder.push(&buf[..len]);
        std::iter::from_fn(|| decoder.next_frame())
            .map(|frame| frame.unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_request_number_replies_to_origin_only() {
        let clients = ClientManager::shared(8);
        let dispatcher = Dispatcher::new(Arc::clone(&clients), REQUESTED_NUMBER);
        let (origin, mut origin_end) = register(&clients, 1).await;
        let (_other, _other_end) = register(&clients, 2).await;

        let outcome = dispatcher
            .dispatch(&origin, ClientMessage::RequestNumber)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Replied);
        assert_eq!(
            read_messages(&mut origin_end).await,
            vec![ServerMessage::RequestedNumber(19238)]
        );
    }

    #[tokio::test]
    async fn test_request_number_reports_write_failure() {
        let clients = ClientManager::shared(8);
        let dispatcher = Dispatcher::new(Arc::clone(&clients), 7);
        let (origin, origin_end) = register(&clients, 1).await;
        drop(origin_end);

        let result = dispatcher
            .dispatch(&origin, ClientMessage::RequestNumber)
            .await;

        assert!(matches!(result, Err(ServerError::Io(_))));
    }

    #[tokio::test]
    async fn test_chat_reaches_every_client_including_sender() {
        let clients = ClientManager::shared(8);
        let dispatcher = Dispatcher::new(Arc::clone(&clients), REQUESTED_NUMBER);

        let mut ends = Vec::new();
        let mut peers = Vec::new();
        for id in 0..4 {
            let (peer, end) = register(&clients, id).await;
            peers.push(peer);
            ends.push(end);
        }

        let outcome = dispatcher
            .dispatch(
                &peers[0],
                ClientMessage::Chat {
                    text: "hello".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Broadcast(BroadcastReport {
                delivered: 4,
                failed: 0
            })
        );
        for end in &mut ends {
            assert_eq!(
                read_messages(end).await,
                vec![ServerMessage::Broadcast {
                    text: "hello".to_string()
                }]
            );
        }
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failed_peer() {
        let clients = ClientManager::shared(8);
        let dispatcher = Dispatcher::new(Arc::clone(&clients), REQUESTED_NUMBER);

        let (sender, mut sender_end) = register(&clients, 1).await;
        let (_closed, closed_end) = register(&clients, 2).await;
        let (_open, mut open_end) = register(&clients, 3).await;
        drop(closed_end);

        let outcome = dispatcher
            .dispatch(
                &sender,
                ClientMessage::Chat {
                    text: "still here".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Broadcast(BroadcastReport {
                delivered: 2,
                failed: 1
            })
        );

        let expected = vec![ServerMessage::Broadcast {
            text: "still here".to_string(),
        }];
        assert_eq!(read_messages(&mut sender_end).await, expected);
        assert_eq!(read_messages(&mut open_end).await, expected);
    }

    #[tokio::test]
    async fn test_test_message_and_unknown_tag_write_nothing() {
        let clients = ClientManager::shared(8);
        let dispatcher = Dispatcher::new(Arc::clone(&clients), REQUESTED_NUMBER);
        let (origin, mut origin_end) = register(&clients, 1).await;

        let logged = dispatcher
            .dispatch(
                &origin,
                ClientMessage::TestMessage {
                    text: "ping".to_string(),
                    number: 3,
                },
            )
            .await
            .unwrap();
        let ignored = dispatcher
            .dispatch(
                &origin,
                ClientMessage::Unknown {
                    tag: 250,
                    payload: vec![1, 2],
                },
            )
            .await
            .unwrap();

        assert_eq!(logged, DispatchOutcome::Logged);
        assert_eq!(ignored, DispatchOutcome::Ignored);

        origin.shutdown().await.unwrap();
        let mut rest = Vec::new();
        origin_end.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_with_empty_registry() {
        let dispatcher = Dispatcher::new(ClientManager::shared(8), REQUESTED_NUMBER);

        let report = dispatcher
            .broadcast(&ServerMessage::Broadcast {
                text: "anyone?".to_string(),
            })
            .await;

        assert_eq!(report, BroadcastReport::default());
    }
}

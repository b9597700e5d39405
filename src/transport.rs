//! Group-addressable pub/sub plus per-peer unicast (§5, §6). The trait is
//! the external contract; the in-process `tokio::sync::broadcast` +
//! per-peer `mpsc` implementation is what the binaries in `src/bin/` wire
//! together for a single allocator + N robot processes on one machine.

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::ids::RobotId;
use crate::messages::Envelope;

pub const TASK_ALLOCATION_GROUP: &str = "TASK-ALLOCATION";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport channel closed")]
    Closed,
    #[error("no unicast peer registered for {0}")]
    UnknownPeer(RobotId),
}

impl<T> From<broadcast::error::SendError<T>> for TransportError {
    fn from(_: broadcast::error::SendError<T>) -> Self {
        TransportError::Closed
    }
}

impl From<mpsc::error::SendError<Envelope>> for TransportError {
    fn from(_: mpsc::error::SendError<Envelope>) -> Self {
        TransportError::Closed
    }
}

/// Publishes to the shared group, or to a single named peer.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, envelope: Envelope) -> Result<(), TransportError>;
    async fn unicast(&self, to: &RobotId, envelope: Envelope) -> Result<(), TransportError>;
}

/// A single process's inbound channel pair: the shared group feed and this
/// process's own unicast inbox.
pub struct Inbox {
    pub group: broadcast::Receiver<Envelope>,
    pub unicast: mpsc::Receiver<Envelope>,
}

/// In-process transport: one `broadcast` channel fans out group messages to
/// every subscriber, and a registry of `mpsc` senders handles unicast.
pub struct InProcessTransport {
    group_tx: broadcast::Sender<Envelope>,
    peers: dashmap::DashMap<RobotId, mpsc::Sender<Envelope>>,
}

impl InProcessTransport {
    pub fn new(group_capacity: usize) -> Self {
        let (group_tx, _) = broadcast::channel(group_capacity);
        Self { group_tx, peers: dashmap::DashMap::new() }
    }

    /// Registers a peer's unicast inbox and returns this process's [`Inbox`].
    pub fn subscribe(&self, robot_id: RobotId, unicast_capacity: usize) -> Inbox {
        let (tx, rx) = mpsc::channel(unicast_capacity);
        self.peers.insert(robot_id, tx);
        Inbox { group: self.group_tx.subscribe(), unicast: rx }
    }

    pub fn group_sender(&self) -> broadcast::Sender<Envelope> {
        self.group_tx.clone()
    }
}

#[async_trait::async_trait]
impl Transport for InProcessTransport {
    async fn publish(&self, envelope: Envelope) -> Result<(), TransportError> {
        // No subscribers yet is not an error; matches `broadcast`'s own
        // semantics of simply not delivering to anyone.
        if self.group_tx.receiver_count() == 0 {
            return Ok(());
        }
        self.group_tx.send(envelope).map(|_| ()).map_err(TransportError::from)
    }

    async fn unicast(&self, to: &RobotId, envelope: Envelope) -> Result<(), TransportError> {
        let sender = self
            .peers
            .get(to)
            .ok_or_else(|| TransportError::UnknownPeer(to.clone()))?
            .clone();
        sender.send(envelope).await.map_err(TransportError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Header, Message};

    fn envelope() -> Envelope {
        Envelope {
            header: Header { sender_id: "allocator".into(), msg_id: "m1".into(), timestamp: 0.0 },
            payload: Message::TaskContractAcknowledgment {
                round_id: crate::ids::RoundId::new("R1"),
                task_id: crate::ids::TaskId::new("T1"),
                robot_id: RobotId::new("robot_001"),
            },
        }
    }

    #[tokio::test]
    async fn unicast_to_unregistered_peer_errors() {
        let transport = InProcessTransport::new(16);
        let err = transport.unicast(&RobotId::new("robot_999"), envelope()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn subscribed_peer_receives_unicast() {
        let transport = InProcessTransport::new(16);
        let mut inbox = transport.subscribe(RobotId::new("robot_001"), 16);
        transport.unicast(&RobotId::new("robot_001"), envelope()).await.unwrap();
        let received = inbox.unicast.recv().await.unwrap();
        match received.payload {
            Message::TaskContractAcknowledgment { robot_id, .. } => assert_eq!(robot_id, RobotId::new("robot_001")),
            _ => panic!("wrong variant"),
        }
    }
}

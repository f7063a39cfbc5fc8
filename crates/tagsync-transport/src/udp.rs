//! UDP transport implementation

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use tagsync_core::{TagSyncError, TagSyncResult};
use tagsync_wire::{Envelope, MAX_FRAME_SIZE};

/// UDP transport for tagsync envelopes
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind to a local address
    pub async fn bind(addr: SocketAddr) -> TagSyncResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| TagSyncError::TransportError(e.to_string()))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| TagSyncError::TransportError(e.to_string()))?;

        Ok(UdpTransport {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send an envelope to a destination. Envelopes over one frame fail to
    /// encode and never reach the socket.
    pub async fn send_to(&self, envelope: &Envelope, dest: SocketAddr) -> TagSyncResult<()> {
        let bytes = envelope.encode()?;
        self.socket
            .send_to(&bytes, dest)
            .await
            .map_err(|e| TagSyncError::TransportError(e.to_string()))?;
        Ok(())
    }

    /// Receive one envelope
    pub async fn recv_from(&self) -> TagSyncResult<(Envelope, SocketAddr)> {
        let mut buf = vec![0u8; MAX_FRAME_SIZE];
        let (len, addr) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| TagSyncError::TransportError(e.to_string()))?;

        let envelope = Envelope::decode(&buf[..len])?;
        Ok((envelope, addr))
    }

    /// Get a clone of the socket for concurrent operations
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

/// Envelope receiver channel
pub type EnvelopeReceiver = mpsc::Receiver<(Envelope, SocketAddr)>;

/// Start a background receive loop. Undecodable datagrams are logged and
/// dropped; the loop ends when the receiver is dropped.
pub fn start_receive_loop(socket: Arc<UdpSocket>, buffer_size: usize) -> EnvelopeReceiver {
    let (tx, rx) = mpsc::channel(buffer_size);

    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_FRAME_SIZE];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, addr)) => match Envelope::decode(&buf[..len]) {
                    Ok(envelope) => {
                        if tx.send((envelope, addr)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%addr, "dropping undecodable datagram: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("UDP receive error: {}", e);
                }
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsync_core::{EntityId, NodeId, Tag, TagSet};
    use tagsync_wire::Message;

    #[tokio::test]
    async fn test_udp_transport_bind() {
        let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        assert_ne!(transport.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_udp_send_and_receive() {
        let a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let tags: TagSet = [Tag::new("Status.Stunned").unwrap()].into_iter().collect();
        let envelope = Envelope::new(
            NodeId::new(1),
            Message::Snapshot {
                entity: EntityId::new(7),
                tags,
            },
        );

        a.send_to(&envelope, b.local_addr()).await.unwrap();
        let (received, from) = b.recv_from().await.unwrap();

        assert_eq!(received, envelope);
        assert_eq!(from, a.local_addr());
    }

    #[tokio::test]
    async fn test_oversized_snapshot_is_refused() {
        let a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let tags: TagSet = (0..20)
            .map(|i| Tag::new(format!("{}{}", "x".repeat(200), i)).unwrap())
            .collect();
        let envelope = Envelope::new(
            NodeId::new(1),
            Message::Snapshot {
                entity: EntityId::new(7),
                tags,
            },
        );

        let result = a.send_to(&envelope, a.local_addr()).await;
        assert!(matches!(result, Err(TagSyncError::InvalidWireFormat(_))));
    }
}

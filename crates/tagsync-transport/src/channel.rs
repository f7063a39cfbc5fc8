//! In-process transport
//!
//! Every registered node gets an unbounded channel. Delivery between two
//! nodes is reliable and preserves send order, matching what the replication
//! core assumes of a real transport.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use tagsync_core::{NodeId, TagSyncError, TagSyncResult};
use tagsync_wire::Envelope;

/// Receiving side of an endpoint
pub type Inbox = mpsc::UnboundedReceiver<Envelope>;

/// Router between in-process nodes
#[derive(Debug, Default)]
pub struct ChannelHub {
    endpoints: Mutex<HashMap<NodeId, mpsc::UnboundedSender<Envelope>>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        ChannelHub::default()
    }

    /// Register a node and get its inbox. Re-registering replaces the old inbox.
    pub fn register(&self, node: NodeId) -> Inbox {
        let (tx, rx) = mpsc::unbounded_channel();
        self.endpoints.lock().insert(node, tx);
        rx
    }

    /// Deliver an envelope to `to`
    pub fn send(&self, to: NodeId, envelope: Envelope) -> TagSyncResult<()> {
        let endpoints = self.endpoints.lock();
        let tx = endpoints.get(&to).ok_or(TagSyncError::NoRoute(to))?;
        tx.send(envelope).map_err(|_| TagSyncError::ChannelClosed)
    }

    /// Encode and decode on the way through, so in-process runs exercise the
    /// same wire path as UDP
    pub fn send_encoded(&self, to: NodeId, envelope: &Envelope) -> TagSyncResult<()> {
        let bytes = envelope.encode()?;
        self.send(to, Envelope::decode(&bytes)?)
    }

    pub fn len(&self) -> usize {
        self.endpoints.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.lock().is_empty()
    }
}

//! tagsync Replica - runtime loop implementation
//!
//! A replica hosts the tag components of one participant. It owns the
//! ownership table and the outbox that the components talk to, and turns
//! their output into envelopes for peers once per tick.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tagsync_core::{EntityId, MutationOutcome, NodeId, TagSet, TagSyncError};
use tagsync_state::{
    is_stale_authority, AllowAll, ComponentRegistry, Ownership, ReplicationLink, TagComponent,
    TagValidator,
};
use tagsync_wire::{Envelope, Message};

use crate::{ConfigError, OwnershipTable, Outbox, ReplicaConfig};

#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    pub ticks: u64,
    pub incoming_queued: u64,
    pub incoming_dropped: u64,
    pub outgoing_popped: u64,
    /// Envelopes held back because the outgoing queue was full
    pub outgoing_deferred: u64,
    /// Envelopes the transport reported as not sent
    pub send_failures: u64,
    pub mutations_changed: u64,
    pub mutations_unchanged: u64,
    pub mutations_rejected: u64,
    /// Requests refused because this replica is no longer the owner
    pub stale_authority: u64,
    /// Requests queued for their owner
    pub requests_forwarded: u64,
    /// Snapshots queued for a peer
    pub snapshots_queued: u64,
    pub snapshots_applied: u64,
    pub snapshots_ignored: u64,
    pub unknown_entity: u64,
    pub last_tick_duration: Duration,
}

/// One participant's view of every replicated tag set
pub struct Replica {
    node_id: NodeId,
    config: ReplicaConfig,
    validator: Arc<dyn TagValidator>,
    ownership: Arc<OwnershipTable>,
    outbox: Arc<Outbox>,
    registry: ComponentRegistry,
    peers: BTreeSet<NodeId>,
    /// Envelopes received but not yet processed
    incoming: VecDeque<Envelope>,
    /// Envelopes ready for the transport, with their destination
    outgoing: VecDeque<(NodeId, Envelope)>,
    /// Snapshots still owed to a single peer after a deferred or failed push
    resend: BTreeSet<(EntityId, NodeId)>,
    stats: RuntimeStats,
}

impl Replica {
    /// Create a replica with the default configuration
    pub fn new(node_id: NodeId) -> Self {
        Self::with_validator(node_id, ReplicaConfig::default(), Arc::new(AllowAll))
    }

    /// Create a replica whose validator is built from `config`
    pub fn with_config(node_id: NodeId, config: ReplicaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let validator = config.validator.build()?;
        Ok(Self::with_validator(node_id, config, validator))
    }

    /// Create a replica with an explicit validator, ignoring `config.validator`
    pub fn with_validator(
        node_id: NodeId,
        config: ReplicaConfig,
        validator: Arc<dyn TagValidator>,
    ) -> Self {
        Replica {
            node_id,
            config,
            validator,
            ownership: Arc::new(OwnershipTable::new(node_id)),
            outbox: Arc::new(Outbox::new()),
            registry: ComponentRegistry::new(),
            peers: BTreeSet::new(),
            incoming: VecDeque::new(),
            outgoing: VecDeque::new(),
            resend: BTreeSet::new(),
            stats: RuntimeStats::default(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    pub fn ownership(&self) -> &OwnershipTable {
        &self.ownership
    }

    // ---------------------------------------------------------------------
    // Entities
    // ---------------------------------------------------------------------

    /// Host a tag component for `entity`, owned by `owner`.
    ///
    /// Spawning an entity that already exists replaces its component with an
    /// empty one.
    pub fn spawn_entity(&mut self, entity: EntityId, owner: NodeId) -> Arc<TagComponent> {
        self.ownership.set_owner(entity, owner);

        let ownership: Arc<dyn Ownership> = self.ownership.clone();
        let link: Arc<dyn ReplicationLink> = self.outbox.clone();
        let component = Arc::new(TagComponent::with_validator(
            entity,
            ownership,
            link,
            Arc::clone(&self.validator),
        ));

        if self.registry.insert(Arc::clone(&component)).is_some() {
            tracing::debug!(%entity, "respawned entity");
        }
        tracing::debug!(%entity, %owner, node = %self.node_id, "spawned entity");
        component
    }

    /// Stop hosting `entity`. Pending traffic for it is discarded.
    pub fn despawn_entity(&mut self, entity: EntityId) -> Option<Arc<TagComponent>> {
        self.ownership.forget(entity);
        self.outbox.forget(entity);
        self.resend.retain(|(e, _)| *e != entity);
        self.incoming.retain(|e| e.message.entity() != entity);
        self.registry.remove(entity)
    }

    pub fn component(&self, entity: EntityId) -> Option<Arc<TagComponent>> {
        self.registry.get(entity).cloned()
    }

    pub fn entities(&self) -> Vec<EntityId> {
        self.registry.entities().collect()
    }

    /// Move ownership of `entity`.
    ///
    /// A replica that becomes the owner schedules a snapshot, so observers
    /// converge on its copy.
    pub fn set_owner(&mut self, entity: EntityId, owner: NodeId) {
        let previous = self.ownership.set_owner(entity, owner);
        if previous == Some(owner) {
            return;
        }
        tracing::info!(%entity, ?previous, %owner, node = %self.node_id, "ownership changed");

        if owner == self.node_id && self.registry.contains(entity) {
            self.outbox.mark_dirty(entity);
        }
    }

    /// Schedule a full snapshot of an owned entity for all peers
    pub fn resync(&mut self, entity: EntityId) -> bool {
        if !self.ownership.is_local_owner(entity) || !self.registry.contains(entity) {
            return false;
        }
        self.outbox.mark_dirty(entity);
        true
    }

    // ---------------------------------------------------------------------
    // Peers
    // ---------------------------------------------------------------------

    /// Add a peer. Every owned entity is resent so the newcomer catches up.
    pub fn add_peer(&mut self, peer: NodeId) -> bool {
        if peer == self.node_id || !self.peers.insert(peer) {
            return false;
        }
        for entity in self.ownership.owned() {
            if self.registry.contains(entity) {
                self.outbox.mark_dirty(entity);
            }
        }
        true
    }

    pub fn remove_peer(&mut self, peer: NodeId) -> bool {
        self.resend.retain(|(_, p)| *p != peer);
        self.peers.remove(&peer)
    }

    pub fn peers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.peers.iter().copied()
    }

    // ---------------------------------------------------------------------
    // Queues
    // ---------------------------------------------------------------------

    /// Queue an incoming envelope for the next tick
    pub fn queue_incoming(&mut self, envelope: Envelope) {
        if self.incoming.len() < self.config.max_incoming {
            self.incoming.push_back(envelope);
            self.stats.incoming_queued += 1;
        } else {
            self.stats.incoming_dropped += 1;
            tracing::warn!(node = %self.node_id, "incoming queue full, envelope dropped");
        }
    }

    /// Get next outgoing envelope (if any)
    pub fn pop_outgoing(&mut self) -> Option<(NodeId, Envelope)> {
        let next = self.outgoing.pop_front();
        if next.is_some() {
            self.stats.outgoing_popped += 1;
        }
        next
    }

    /// Take every outgoing envelope
    pub fn drain_outgoing(&mut self) -> Vec<(NodeId, Envelope)> {
        let drained: Vec<_> = self.outgoing.drain(..).collect();
        self.stats.outgoing_popped += drained.len() as u64;
        drained
    }

    pub fn outgoing_len(&self) -> usize {
        self.outgoing.len()
    }

    /// Report an envelope the transport could not deliver.
    ///
    /// Transport errors are retried: a snapshot goes to `to` again on the next
    /// tick and a request returns to the front of the outbox. An envelope the
    /// codec refuses would fail the same way again and is dropped.
    pub fn send_failed(&mut self, to: NodeId, envelope: Envelope, error: &TagSyncError) {
        self.stats.send_failures += 1;
        if !matches!(error, TagSyncError::TransportError(_)) {
            tracing::warn!(node = %self.node_id, %to, "envelope dropped: {}", error);
            return;
        }

        let entity = envelope.message.entity();
        if !self.registry.contains(entity) {
            return;
        }
        tracing::debug!(
            node = %self.node_id,
            %to,
            %entity,
            "send failed, retrying next tick: {}",
            error
        );
        match envelope.message {
            Message::Snapshot { .. } => {
                self.resend.insert((entity, to));
            }
            Message::Mutation { request, .. } => self.outbox.requeue(vec![(entity, request)]),
        }
    }

    // ---------------------------------------------------------------------
    // Tick
    // ---------------------------------------------------------------------

    /// Execute one tick: ingest, dispatch forwarded requests, flush snapshots
    pub fn tick(&mut self) {
        let start = Instant::now();
        self.stats.ticks += 1;

        // Stage 1: Apply incoming requests and snapshots
        self.ingest();

        // Stage 2: Route requests forwarded by local observers
        self.dispatch_requests();

        // Stage 3: Snapshot every dirty entity to all peers
        self.flush_snapshots();

        self.stats.last_tick_duration = start.elapsed();
    }

    fn ingest(&mut self) {
        while let Some(envelope) = self.incoming.pop_front() {
            let entity = envelope.message.entity();
            let Some(component) = self.component(entity) else {
                self.stats.unknown_entity += 1;
                tracing::debug!(%entity, from = %envelope.from, "message for unknown entity dropped");
                continue;
            };

            match envelope.message {
                Message::Mutation { request, .. } => {
                    let outcome = component.apply_remote(&request);
                    self.record_outcome(entity, envelope.from, &outcome);
                }
                Message::Snapshot { tags, .. } => {
                    self.accept_snapshot(&component, envelope.from, tags);
                }
            }
        }
    }

    fn accept_snapshot(&mut self, component: &TagComponent, from: NodeId, tags: TagSet) {
        let entity = component.entity();
        if self.ownership.owner_of(entity) != Some(from) {
            self.stats.snapshots_ignored += 1;
            tracing::debug!(%entity, %from, "snapshot from non-owner ignored");
            return;
        }

        if component.receive_snapshot(tags) {
            self.stats.snapshots_applied += 1;
        }
    }

    fn record_outcome(&mut self, entity: EntityId, from: NodeId, outcome: &MutationOutcome) {
        match outcome {
            MutationOutcome::Changed => self.stats.mutations_changed += 1,
            MutationOutcome::Unchanged => self.stats.mutations_unchanged += 1,
            MutationOutcome::Forwarded => {}
            MutationOutcome::Rejected(reason) => {
                self.stats.mutations_rejected += 1;
                if is_stale_authority(outcome) {
                    self.stats.stale_authority += 1;
                }
                tracing::debug!(%entity, %from, %reason, "remote request rejected");
            }
        }
    }

    fn dispatch_requests(&mut self) {
        let mut deferred = Vec::new();
        for (entity, request) in self.outbox.take_requests() {
            match self.ownership.owner_of(entity) {
                Some(owner) if owner == self.node_id => {
                    // Ownership moved here after the request was forwarded
                    if let Some(component) = self.component(entity) {
                        let outcome = component.apply_remote(&request);
                        self.record_outcome(entity, self.node_id, &outcome);
                    }
                }
                Some(_) if self.outgoing_full() => deferred.push((entity, request)),
                Some(owner) => {
                    self.stats.requests_forwarded += 1;
                    let message = Message::Mutation { entity, request };
                    self.outgoing.push_back((owner, Envelope::new(self.node_id, message)));
                }
                None => {
                    tracing::warn!(%entity, op = ?request.op(), "no owner for forwarded request, dropped");
                }
            }
        }

        if !deferred.is_empty() {
            self.stats.outgoing_deferred += deferred.len() as u64;
            tracing::warn!(
                node = %self.node_id,
                count = deferred.len(),
                "outgoing queue full, requests deferred"
            );
            self.outbox.requeue(deferred);
        }
    }

    /// Push a snapshot of every dirty entity to all peers, plus any snapshot
    /// still owed to a single peer. Whatever does not fit the outgoing queue
    /// stays owed until a later tick.
    fn flush_snapshots(&mut self) {
        let mut targets = std::mem::take(&mut self.resend);
        for entity in self.outbox.take_dirty() {
            targets.extend(self.peers.iter().map(|&peer| (entity, peer)));
        }

        let mut deferred = 0u64;
        for (entity, peer) in targets {
            if !self.ownership.is_local_owner(entity) || !self.peers.contains(&peer) {
                continue;
            }
            let Some(component) = self.component(entity) else {
                continue;
            };
            if self.outgoing_full() {
                self.resend.insert((entity, peer));
                deferred += 1;
                continue;
            }

            let tags = component.snapshot();
            tracing::trace!(%entity, %peer, tags = tags.len(), "pushing snapshot");
            let envelope = Envelope::new(self.node_id, Message::Snapshot { entity, tags });
            self.outgoing.push_back((peer, envelope));
            self.stats.snapshots_queued += 1;
        }

        if deferred > 0 {
            self.stats.outgoing_deferred += deferred;
            tracing::warn!(
                node = %self.node_id,
                count = deferred,
                "outgoing queue full, snapshots deferred"
            );
        }
    }

    fn outgoing_full(&self) -> bool {
        self.outgoing.len() >= self.config.max_outgoing
    }
}

impl std::fmt::Debug for Replica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("node_id", &self.node_id)
            .field("entities", &self.registry.len())
            .field("peers", &self.peers)
            .field("incoming", &self.incoming.len())
            .field("outgoing", &self.outgoing.len())
            .finish()
    }
}

//! Multi-replica simulator
//!
//! Runs several [`Replica`]s in lockstep. Each step ticks every replica, puts
//! its output on the [`SimNetwork`], and hands whatever the network delivers
//! to the recipient's [`ChannelHub`] inbox.

use std::sync::Arc;

use tagsync_core::{EntityId, NodeId, TagSet};
use tagsync_runtime::{Replica, ReplicaConfig};
use tagsync_state::{TagComponent, TagValidator};
use tagsync_transport::{ChannelHub, Inbox};
use tagsync_wire::Envelope;

use crate::network::{LinkConditions, SimNetwork};

struct SimReplica {
    replica: Replica,
    inbox: Inbox,
}

/// Counts for one simulation step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub sent: usize,
    pub delivered: usize,
}

impl StepReport {
    pub fn is_idle(&self) -> bool {
        self.sent == 0 && self.delivered == 0
    }
}

/// A set of fully meshed replicas on a simulated network
pub struct Cluster {
    replicas: Vec<SimReplica>,
    hub: ChannelHub,
    network: SimNetwork,
    steps: u64,
}

impl Cluster {
    /// `nodes` replicas with ids `1..=nodes`, every one a peer of every other
    pub fn new(nodes: u64, conditions: LinkConditions, seed: u64) -> Self {
        Self::build(nodes, conditions, seed, |_| None)
    }

    /// Like [`Cluster::new`] with a validator for every replica
    pub fn with_validator(
        nodes: u64,
        conditions: LinkConditions,
        seed: u64,
        validator: Arc<dyn TagValidator>,
    ) -> Self {
        Self::build(nodes, conditions, seed, |_| Some(Arc::clone(&validator)))
    }

    fn build<F>(nodes: u64, conditions: LinkConditions, seed: u64, validator_for: F) -> Self
    where
        F: Fn(NodeId) -> Option<Arc<dyn TagValidator>>,
    {
        let hub = ChannelHub::new();
        let ids: Vec<NodeId> = (1..=nodes).map(NodeId::new).collect();

        let replicas = ids
            .iter()
            .map(|&id| {
                let mut replica = match validator_for(id) {
                    Some(validator) => {
                        Replica::with_validator(id, ReplicaConfig::default(), validator)
                    }
                    None => Replica::new(id),
                };
                for &peer in &ids {
                    replica.add_peer(peer);
                }
                SimReplica {
                    replica,
                    inbox: hub.register(id),
                }
            })
            .collect();

        Cluster {
            replicas,
            hub,
            network: SimNetwork::new(conditions, seed),
            steps: 0,
        }
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.replicas.iter().map(|r| r.replica.node_id()).collect()
    }

    pub fn replica(&self, node: NodeId) -> Option<&Replica> {
        self.replicas
            .iter()
            .find(|r| r.replica.node_id() == node)
            .map(|r| &r.replica)
    }

    pub fn replica_mut(&mut self, node: NodeId) -> Option<&mut Replica> {
        self.replicas
            .iter_mut()
            .find(|r| r.replica.node_id() == node)
            .map(|r| &mut r.replica)
    }

    pub fn component(&self, node: NodeId, entity: EntityId) -> Option<Arc<TagComponent>> {
        self.replica(node)?.component(entity)
    }

    /// Spawn `entity` on every replica, owned by `owner`
    pub fn spawn_entity(&mut self, entity: EntityId, owner: NodeId) {
        for sim in &mut self.replicas {
            sim.replica.spawn_entity(entity, owner);
        }
    }

    /// Move ownership of `entity` on every replica at once
    pub fn set_owner(&mut self, entity: EntityId, owner: NodeId) {
        for sim in &mut self.replicas {
            sim.replica.set_owner(entity, owner);
        }
    }

    /// Advance the whole cluster by one step
    pub fn step(&mut self) -> StepReport {
        self.steps += 1;
        let mut report = StepReport::default();

        for sim in &mut self.replicas {
            while let Ok(envelope) = sim.inbox.try_recv() {
                sim.replica.queue_incoming(envelope);
            }
            sim.replica.tick();

            let from = sim.replica.node_id();
            for (to, envelope) in sim.replica.drain_outgoing() {
                match self.network.send(from, to, &envelope) {
                    Ok(()) => report.sent += 1,
                    Err(e) => sim.replica.send_failed(to, envelope, &e),
                }
            }
        }

        for (from, to, bytes) in self.network.advance() {
            let delivered =
                Envelope::decode(&bytes).and_then(|envelope| self.hub.send(to, envelope));
            match delivered {
                Ok(()) => report.delivered += 1,
                Err(e) => tracing::warn!(%from, %to, "delivery failed: {}", e),
            }
        }

        report
    }

    /// Step until nothing is sent, delivered or in flight. Inboxes are drained
    /// at the start of every step, so an idle step leaves them empty.
    /// Returns the number of steps taken, or `None` if `max_steps` ran out.
    pub fn run_until_quiet(&mut self, max_steps: usize) -> Option<usize> {
        for taken in 1..=max_steps {
            let report = self.step();
            if report.is_idle() && self.network.in_flight() == 0 {
                return Some(taken);
            }
        }
        None
    }

    /// Whether every replica mirrors the owner's copy of `entity`
    pub fn converged(&self, entity: EntityId) -> bool {
        let Some(expected) = self.authoritative(entity) else {
            return false;
        };
        self.replicas.iter().all(|sim| {
            sim.replica
                .component(entity)
                .map_or(false, |c| c.snapshot() == expected)
        })
    }

    /// The owner's copy of `entity`
    pub fn authoritative(&self, entity: EntityId) -> Option<TagSet> {
        self.replicas.iter().find_map(|sim| {
            if sim.replica.ownership().is_local_owner(entity) {
                sim.replica.component(entity).map(|c| c.snapshot())
            } else {
                None
            }
        })
    }

    pub fn network(&self) -> &SimNetwork {
        &self.network
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

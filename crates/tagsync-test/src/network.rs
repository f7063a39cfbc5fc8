//! Simulated links between replicas
//!
//! Envelopes are delayed and duplicated according to [`LinkConditions`]. Each
//! directed link stays FIFO and nothing is lost, since replication assumes an
//! ordered reliable channel. Duplicates are delivered right behind their
//! original, which is what an at-least-once transport with retransmit looks
//! like from the receiver's side.

use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tagsync_core::{NodeId, TagSyncResult};
use tagsync_wire::Envelope;

/// Conditions applied to every link
#[derive(Clone, Debug)]
pub struct LinkConditions {
    /// Probability (0.0 - 1.0) that an envelope is delivered twice
    pub duplicate_prob: f64,
    /// Maximum extra delay in steps. An envelope never overtakes an earlier
    /// one on the same link.
    pub max_delay_steps: u32,
}

impl Default for LinkConditions {
    fn default() -> Self {
        Self::perfect()
    }
}

impl LinkConditions {
    /// Next-step delivery, no duplicates
    pub fn perfect() -> Self {
        LinkConditions {
            duplicate_prob: 0.0,
            max_delay_steps: 0,
        }
    }

    /// Frequent retransmits
    pub fn duplicating() -> Self {
        LinkConditions {
            duplicate_prob: 0.3,
            max_delay_steps: 0,
        }
    }

    /// Slow links with occasional retransmits
    pub fn laggy() -> Self {
        LinkConditions {
            duplicate_prob: 0.05,
            max_delay_steps: 5,
        }
    }
}

#[derive(Clone, Debug)]
struct InFlight {
    due: u64,
    bytes: Vec<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct NetworkStats {
    pub sent: u64,
    pub delivered: u64,
    pub duplicated: u64,
    pub bytes: u64,
}

/// Seeded in-memory network
pub struct SimNetwork {
    conditions: LinkConditions,
    rng: StdRng,
    links: HashMap<(NodeId, NodeId), VecDeque<InFlight>>,
    now: u64,
    stats: NetworkStats,
}

impl SimNetwork {
    pub fn new(conditions: LinkConditions, seed: u64) -> Self {
        SimNetwork {
            conditions,
            rng: StdRng::seed_from_u64(seed),
            links: HashMap::new(),
            now: 0,
            stats: NetworkStats::default(),
        }
    }

    /// Put an envelope on the `from -> to` link. It is encoded here so every
    /// simulated hop goes through the wire codec.
    pub fn send(&mut self, from: NodeId, to: NodeId, envelope: &Envelope) -> TagSyncResult<()> {
        let bytes = envelope.encode()?;
        self.stats.sent += 1;
        self.stats.bytes += bytes.len() as u64;

        let delay = if self.conditions.max_delay_steps == 0 {
            0
        } else {
            self.rng.gen_range(0..=self.conditions.max_delay_steps) as u64
        };
        let duplicate = self.conditions.duplicate_prob > 0.0
            && self.rng.gen_bool(self.conditions.duplicate_prob.min(1.0));

        let link = self.links.entry((from, to)).or_default();
        let earliest = link.back().map(|last| last.due).unwrap_or(0);
        let due = (self.now + 1 + delay).max(earliest);

        if duplicate {
            link.push_back(InFlight {
                due,
                bytes: bytes.clone(),
            });
            self.stats.duplicated += 1;
        }
        link.push_back(InFlight { due, bytes });
        Ok(())
    }

    /// Advance one step and return everything due, per link in send order
    pub fn advance(&mut self) -> Vec<(NodeId, NodeId, Vec<u8>)> {
        self.now += 1;
        let now = self.now;
        let mut delivered = Vec::new();

        for ((from, to), link) in self.links.iter_mut() {
            while link.front().map_or(false, |p| p.due <= now) {
                if let Some(packet) = link.pop_front() {
                    delivered.push((*from, *to, packet.bytes));
                }
            }
        }

        self.stats.delivered += delivered.len() as u64;
        delivered
    }

    pub fn in_flight(&self) -> usize {
        self.links.values().map(VecDeque::len).sum()
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }
}

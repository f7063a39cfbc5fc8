//! Outbound replication queue
//!
//! Components call into the outbox through [`ReplicationLink`] from whatever
//! thread they run on. The replica drains it once per tick.

use std::collections::{BTreeSet, VecDeque};

use parking_lot::Mutex;

use tagsync_core::{EntityId, MutationRequest};
use tagsync_state::ReplicationLink;

#[derive(Debug, Default)]
pub struct Outbox {
    requests: Mutex<VecDeque<(EntityId, MutationRequest)>>,
    dirty: Mutex<BTreeSet<EntityId>>,
}

impl Outbox {
    pub fn new() -> Self {
        Outbox::default()
    }

    /// Take all forwarded requests in submission order
    pub fn take_requests(&self) -> Vec<(EntityId, MutationRequest)> {
        self.requests.lock().drain(..).collect()
    }

    /// Take all dirty entities. Repeated marks between ticks collapse into one.
    pub fn take_dirty(&self) -> Vec<EntityId> {
        std::mem::take(&mut *self.dirty.lock()).into_iter().collect()
    }

    /// Put requests that could not be sent back ahead of anything newer
    pub fn requeue(&self, requests: Vec<(EntityId, MutationRequest)>) {
        let mut queue = self.requests.lock();
        for request in requests.into_iter().rev() {
            queue.push_front(request);
        }
    }

    pub fn is_dirty(&self, entity: EntityId) -> bool {
        self.dirty.lock().contains(&entity)
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.lock().len()
    }

    /// Drop everything queued for `entity`
    pub fn forget(&self, entity: EntityId) {
        self.requests.lock().retain(|(e, _)| *e != entity);
        self.dirty.lock().remove(&entity);
    }
}

impl ReplicationLink for Outbox {
    fn send_mutation_request(&self, entity: EntityId, request: MutationRequest) {
        self.requests.lock().push_back((entity, request));
    }

    fn mark_dirty(&self, entity: EntityId) {
        self.dirty.lock().insert(entity);
    }
}

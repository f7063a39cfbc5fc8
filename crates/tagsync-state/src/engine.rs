//! Mutation engine - applies requests to the authoritative tag set
//!
//! Pipeline per request:
//! 1. Authority check (stale or forged calls are refused)
//! 2. Validation of every named tag (all-or-nothing)
//! 3. Frame budget (the resulting set must still fit one snapshot frame)
//! 4. Idempotent set mutation
//!
//! The caller holds the entity's write lock for the whole pipeline so batch
//! validation and application are atomic.

use std::sync::Arc;

use tagsync_core::{
    EntityId, MutationOutcome, MutationRequest, RejectReason, Role, TagSet,
};

use tagsync_wire::{payload_len, MAX_PAYLOAD_SIZE};

use crate::{first_disallowed, AllowAll, TagValidator};

/// Applies mutation requests under validation and authority checks
#[derive(Clone)]
pub struct MutationEngine {
    validator: Arc<dyn TagValidator>,
    max_payload: usize,
}

impl MutationEngine {
    pub fn new(validator: Arc<dyn TagValidator>) -> Self {
        MutationEngine {
            validator,
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }

    /// Lower the payload budget below one frame
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload.min(MAX_PAYLOAD_SIZE);
        self
    }

    pub fn validator(&self) -> &dyn TagValidator {
        self.validator.as_ref()
    }

    /// Largest tag payload a snapshot or forwarded request may carry
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Refuse a request whose own payload cannot be sent in one frame
    pub fn check_forwardable(&self, request: &MutationRequest) -> Option<RejectReason> {
        let size = payload_len(request.tags());
        (size > self.max_payload).then_some(RejectReason::TooLarge {
            size,
            limit: self.max_payload,
        })
    }

    /// Apply `request` to `tags`.
    ///
    /// Never fails: every refusal is reported through the outcome and leaves
    /// `tags` untouched.
    pub fn apply(
        &self,
        entity: EntityId,
        role: Role,
        tags: &mut TagSet,
        request: &MutationRequest,
    ) -> MutationOutcome {
        // Stage 1: Authority
        if !role.is_authority() {
            tracing::warn!(%entity, op = ?request.op(), "mutation reached a non-authority, refused");
            return MutationOutcome::Rejected(RejectReason::NotAuthority);
        }

        // Stage 2: Validation
        if let Some(tag) = first_disallowed(self.validator.as_ref(), request, tags) {
            tracing::debug!(%entity, op = ?request.op(), %tag, "mutation refused by validator");
            return MutationOutcome::Rejected(RejectReason::Validation(tag.clone()));
        }

        // Stage 3: Frame budget. Removals only shrink the set.
        if let Some(size) = grown_payload(tags, request) {
            if size > self.max_payload {
                tracing::debug!(
                    %entity,
                    op = ?request.op(),
                    size,
                    limit = self.max_payload,
                    "mutation would not fit a snapshot frame"
                );
                return MutationOutcome::Rejected(RejectReason::TooLarge {
                    size,
                    limit: self.max_payload,
                });
            }
        }

        // Stage 4: Mutation
        let changed = match request {
            MutationRequest::Add(tag) => tags.add(tag.clone()),
            MutationRequest::Remove(tag) => tags.remove(tag),
            MutationRequest::AddBatch(batch) => tags.add_batch(batch),
            MutationRequest::RemoveBatch(batch) => tags.remove_batch(batch),
        };

        if changed {
            tracing::debug!(%entity, op = ?request.op(), size = tags.len(), "tags changed");
            MutationOutcome::Changed
        } else {
            MutationOutcome::Unchanged
        }
    }
}

/// Snapshot payload after an addition, `None` for removals
fn grown_payload(tags: &TagSet, request: &MutationRequest) -> Option<usize> {
    match request {
        MutationRequest::Add(_) | MutationRequest::AddBatch(_) => {
            let added = payload_len(request.tags().filter(|tag| !tags.contains(tag)));
            Some(payload_len(tags) + added)
        }
        MutationRequest::Remove(_) | MutationRequest::RemoveBatch(_) => None,
    }
}

impl Default for MutationEngine {
    fn default() -> Self {
        MutationEngine::new(Arc::new(AllowAll))
    }
}

impl std::fmt::Debug for MutationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationEngine").finish_non_exhaustive()
    }
}

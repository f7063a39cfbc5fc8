//! Mutation requests and their outcomes

use std::fmt;

use crate::{Tag, TagSet};

/// Kind of mutation carried by a request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MutationOp {
    Add = 1,
    Remove = 2,
    AddBatch = 3,
    RemoveBatch = 4,
}

impl MutationOp {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(MutationOp::Add),
            2 => Some(MutationOp::Remove),
            3 => Some(MutationOp::AddBatch),
            4 => Some(MutationOp::RemoveBatch),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// A request to change an entity's tag set. Transient, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationRequest {
    Add(Tag),
    Remove(Tag),
    AddBatch(TagSet),
    RemoveBatch(TagSet),
}

impl MutationRequest {
    pub fn op(&self) -> MutationOp {
        match self {
            MutationRequest::Add(_) => MutationOp::Add,
            MutationRequest::Remove(_) => MutationOp::Remove,
            MutationRequest::AddBatch(_) => MutationOp::AddBatch,
            MutationRequest::RemoveBatch(_) => MutationOp::RemoveBatch,
        }
    }

    /// Every tag named by the request
    pub fn tags(&self) -> Box<dyn Iterator<Item = &Tag> + '_> {
        match self {
            MutationRequest::Add(tag) | MutationRequest::Remove(tag) => {
                Box::new(std::iter::once(tag))
            }
            MutationRequest::AddBatch(tags) | MutationRequest::RemoveBatch(tags) => {
                Box::new(tags.iter())
            }
        }
    }

    /// Number of tags named by the request
    pub fn len(&self) -> usize {
        match self {
            MutationRequest::Add(_) | MutationRequest::Remove(_) => 1,
            MutationRequest::AddBatch(tags) | MutationRequest::RemoveBatch(tags) => tags.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuild a request from its op and payload
    pub fn from_parts(op: MutationOp, tags: TagSet) -> Option<Self> {
        match op {
            MutationOp::Add | MutationOp::Remove => {
                if tags.len() != 1 {
                    return None;
                }
                let tag = tags.into_iter().next()?;
                Some(if op == MutationOp::Add {
                    MutationRequest::Add(tag)
                } else {
                    MutationRequest::Remove(tag)
                })
            }
            MutationOp::AddBatch => Some(MutationRequest::AddBatch(tags)),
            MutationOp::RemoveBatch => Some(MutationRequest::RemoveBatch(tags)),
        }
    }
}

/// Reason a mutation was refused. Refusal is silent: callers see it only
/// through the returned outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The validator refused this tag; nothing in the request was applied
    Validation(Tag),
    /// The participant applying the request is not the authority
    NotAuthority,
    /// The request, or the set it would produce, does not fit one frame
    TooLarge { size: usize, limit: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Validation(tag) => write!(f, "tag {tag} not allowed"),
            RejectReason::NotAuthority => f.write_str("not the authority"),
            RejectReason::TooLarge { size, limit } => {
                write!(f, "{size} payload bytes exceed the {limit} byte limit")
            }
        }
    }
}

/// Result of submitting a mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Applied locally and the set changed
    Changed,
    /// Applied locally, nothing changed (tag already present/absent, empty batch)
    Unchanged,
    /// Sent to the authority; the local mirror is untouched
    Forwarded,
    /// Refused without effect
    Rejected(RejectReason),
}

impl MutationOutcome {
    /// Whether the tag set changed as a direct result of this call
    #[inline]
    pub fn changed(&self) -> bool {
        matches!(self, MutationOutcome::Changed)
    }

    #[inline]
    pub fn is_rejected(&self) -> bool {
        matches!(self, MutationOutcome::Rejected(_))
    }
}

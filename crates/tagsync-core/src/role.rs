//! Participant roles

use std::fmt;

/// Role a participant holds for one entity's tag state.
///
/// Exactly one participant is the authority at any time. The role is decided
/// by the host's ownership model; tagsync only reads it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Holds the canonical copy and applies mutations
    Authority,
    /// Holds a read-only mirror fed by snapshots
    Observer,
}

impl Role {
    #[inline]
    pub fn is_authority(self) -> bool {
        matches!(self, Role::Authority)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Authority => f.write_str("authority"),
            Role::Observer => f.write_str("observer"),
        }
    }
}

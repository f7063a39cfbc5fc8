//! Validation gate - which tags may enter or leave the set
//!
//! The authority evaluates the validator on every request it applies. An
//! observer's opinion about admissibility is never trusted.

use std::collections::HashSet;

use tagsync_core::{MutationRequest, Tag, TagSet};

/// Admission policy for tags.
///
/// `current` is the tag set as it stands before the request, so policies can
/// depend on what the entity already carries.
pub trait TagValidator: Send + Sync {
    fn is_allowed(&self, tag: &Tag, current: &TagSet) -> bool;
}

/// Default policy: every well-formed tag is allowed
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl TagValidator for AllowAll {
    fn is_allowed(&self, _tag: &Tag, _current: &TagSet) -> bool {
        true
    }
}

/// Refuses an explicit list of tags
#[derive(Clone, Debug, Default)]
pub struct DenyList {
    denied: HashSet<Tag>,
}

impl DenyList {
    pub fn new(denied: impl IntoIterator<Item = Tag>) -> Self {
        DenyList {
            denied: denied.into_iter().collect(),
        }
    }
}

impl TagValidator for DenyList {
    fn is_allowed(&self, tag: &Tag, _current: &TagSet) -> bool {
        !self.denied.contains(tag)
    }
}

/// Allows only tags at or below one of the given roots (`Status` admits
/// `Status` and `Status.Stunned`, not `Statuses`)
#[derive(Clone, Debug, Default)]
pub struct NamespaceAllowList {
    roots: Vec<Tag>,
}

impl NamespaceAllowList {
    pub fn new(roots: impl IntoIterator<Item = Tag>) -> Self {
        NamespaceAllowList {
            roots: roots.into_iter().collect(),
        }
    }
}

impl TagValidator for NamespaceAllowList {
    fn is_allowed(&self, tag: &Tag, _current: &TagSet) -> bool {
        self.roots.iter().any(|root| tag.is_descendant_of(root))
    }
}

impl<F> TagValidator for F
where
    F: Fn(&Tag, &TagSet) -> bool + Send + Sync,
{
    fn is_allowed(&self, tag: &Tag, current: &TagSet) -> bool {
        self(tag, current)
    }
}

/// Check every tag named by `request`. Returns the first refused tag.
pub fn first_disallowed<'r>(
    validator: &dyn TagValidator,
    request: &'r MutationRequest,
    current: &TagSet,
) -> Option<&'r Tag> {
    request.tags().find(|tag| !validator.is_allowed(tag, current))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> Tag {
        Tag::new(name).unwrap()
    }

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.is_allowed(&tag("Anything.Goes"), &TagSet::new()));
    }

    #[test]
    fn test_deny_list() {
        let validator = DenyList::new([tag("Forbidden")]);
        assert!(!validator.is_allowed(&tag("Forbidden"), &TagSet::new()));
        assert!(validator.is_allowed(&tag("Forbidden.Child"), &TagSet::new()));
    }

    #[test]
    fn test_namespace_allow_list() {
        let validator = NamespaceAllowList::new([tag("Status"), tag("Team")]);
        let empty = TagSet::new();
        assert!(validator.is_allowed(&tag("Status.Stunned"), &empty));
        assert!(validator.is_allowed(&tag("Team"), &empty));
        assert!(!validator.is_allowed(&tag("Statuses"), &empty));
        assert!(!validator.is_allowed(&tag("Ability.Fire"), &empty));
    }

    #[test]
    fn test_closure_sees_current_state() {
        // "Status.Dead" cannot be combined with "Status.Invulnerable"
        let validator = |t: &Tag, current: &TagSet| {
            !(t.as_str() == "Status.Dead" && current.contains(&tag("Status.Invulnerable")))
        };

        let protected: TagSet = [tag("Status.Invulnerable")].into_iter().collect();
        assert!(!validator.is_allowed(&tag("Status.Dead"), &protected));
        assert!(validator.is_allowed(&tag("Status.Dead"), &TagSet::new()));
    }

    #[test]
    fn test_first_disallowed_scans_batch() {
        let validator = DenyList::new([tag("Forbidden")]);
        let batch: TagSet = [tag("A"), tag("Forbidden"), tag("Z")].into_iter().collect();
        let request = MutationRequest::AddBatch(batch);

        assert_eq!(
            first_disallowed(&validator, &request, &TagSet::new()),
            Some(&tag("Forbidden"))
        );
        assert_eq!(
            first_disallowed(&AllowAll, &request, &TagSet::new()),
            None
        );
    }
}

//! Tag set - the replicated collection of tags
//!
//! Pure data structure with no networking awareness. Admissibility is
//! decided before a tag reaches the set; the set never rejects silently.

use std::collections::btree_set;
use std::collections::BTreeSet;

use crate::Tag;

/// Set of tags. Iteration order is sorted but carries no meaning.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TagSet {
    tags: BTreeSet<Tag>,
}

/// Membership difference between two sets
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagDiff {
    pub added: Vec<Tag>,
    pub removed: Vec<Tag>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl TagSet {
    pub fn new() -> Self {
        TagSet::default()
    }

    #[inline]
    pub fn contains(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    /// True if every tag of `tags` is present. Vacuously true for an empty input.
    pub fn contains_all(&self, tags: &TagSet) -> bool {
        tags.tags.is_subset(&self.tags)
    }

    /// True if at least one tag of `tags` is present. False for an empty input.
    pub fn contains_any(&self, tags: &TagSet) -> bool {
        !tags.tags.is_disjoint(&self.tags)
    }

    /// Insert a tag. Returns true iff it was absent.
    pub fn add(&mut self, tag: Tag) -> bool {
        debug_assert!(
            Tag::is_well_formed(tag.as_str()),
            "malformed tag reached TagSet: {tag:?}"
        );
        self.tags.insert(tag)
    }

    /// Remove a tag. Returns true iff it was present.
    pub fn remove(&mut self, tag: &Tag) -> bool {
        self.tags.remove(tag)
    }

    /// Insert every tag independently. Returns true iff at least one was new.
    pub fn add_batch(&mut self, tags: &TagSet) -> bool {
        let mut changed = false;
        for tag in tags {
            changed |= self.add(tag.clone());
        }
        changed
    }

    /// Remove every tag independently. Returns true iff at least one was present.
    pub fn remove_batch(&mut self, tags: &TagSet) -> bool {
        let mut changed = false;
        for tag in tags {
            changed |= self.remove(tag);
        }
        changed
    }

    /// Immutable copy for transmission or inspection
    pub fn snapshot(&self) -> TagSet {
        self.clone()
    }

    /// Tags added and removed going from `self` to `next`
    pub fn diff(&self, next: &TagSet) -> TagDiff {
        TagDiff {
            added: next.tags.difference(&self.tags).cloned().collect(),
            removed: self.tags.difference(&next.tags).cloned().collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Tag> {
        self.tags.iter()
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        TagSet {
            tags: iter.into_iter().collect(),
        }
    }
}

impl Extend<Tag> for TagSet {
    fn extend<I: IntoIterator<Item = Tag>>(&mut self, iter: I) {
        for tag in iter {
            self.add(tag);
        }
    }
}

impl IntoIterator for TagSet {
    type Item = Tag;
    type IntoIter = btree_set::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = btree_set::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl From<Tag> for TagSet {
    fn from(tag: Tag) -> Self {
        std::iter::once(tag).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tag(name: &str) -> Tag {
        Tag::new(name).unwrap()
    }

    fn set(names: &[&str]) -> TagSet {
        names.iter().map(|n| tag(n)).collect()
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut tags = TagSet::new();
        assert!(tags.add(tag("Status.Stunned")));
        assert!(!tags.add(tag("Status.Stunned")));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut tags = set(&["A"]);
        assert!(!tags.remove(&tag("B")));
        assert!(tags.remove(&tag("A")));
        assert!(tags.is_empty());
    }

    #[test]
    fn test_batch_partial_success() {
        let mut tags = set(&["A", "B"]);
        assert!(tags.remove_batch(&set(&["B", "C"])));
        assert_eq!(tags, set(&["A"]));

        assert!(tags.add_batch(&set(&["A", "D"])));
        assert_eq!(tags, set(&["A", "D"]));

        assert!(!tags.add_batch(&TagSet::new()));
        assert!(!tags.remove_batch(&set(&["X"])));
    }

    #[test]
    fn test_contains_all_and_any() {
        let tags = set(&["X", "Y"]);
        assert!(tags.contains_all(&set(&["X", "Y"])));
        assert!(!tags.contains_all(&set(&["X", "Z"])));
        assert!(tags.contains_any(&set(&["Z", "Y"])));
        assert!(!tags.contains_any(&set(&["Z"])));

        assert!(tags.contains_all(&TagSet::new()));
        assert!(!tags.contains_any(&TagSet::new()));
    }

    #[test]
    fn test_diff() {
        let before = set(&["A", "B"]);
        let after = set(&["B", "C"]);
        let diff = before.diff(&after);
        assert_eq!(diff.added, vec![tag("C")]);
        assert_eq!(diff.removed, vec![tag("A")]);
        assert!(before.diff(&before).is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut tags = set(&["A"]);
        let snapshot = tags.snapshot();
        tags.add(tag("B"));
        assert_eq!(snapshot, set(&["A"]));
    }

    fn arb_tag() -> impl Strategy<Value = Tag> {
        "[A-Za-z][A-Za-z0-9]{0,6}(\\.[A-Za-z0-9]{1,6}){0,2}".prop_map(|s| Tag::new(s).unwrap())
    }

    proptest! {
        #[test]
        fn prop_add_then_remove_leaves_absent(t in arb_tag(), others in prop::collection::vec(arb_tag(), 0..8)) {
            let mut tags: TagSet = others.into_iter().collect();
            tags.add(t.clone());
            tags.remove(&t);
            prop_assert!(!tags.contains(&t));
        }

        #[test]
        fn prop_remove_then_add_leaves_present(t in arb_tag(), others in prop::collection::vec(arb_tag(), 0..8)) {
            let mut tags: TagSet = others.into_iter().collect();
            tags.remove(&t);
            tags.add(t.clone());
            prop_assert!(tags.contains(&t));
        }

        #[test]
        fn prop_second_add_reports_no_change(t in arb_tag(), others in prop::collection::vec(arb_tag(), 0..8)) {
            let mut tags: TagSet = others.into_iter().collect();
            tags.add(t.clone());
            let once = tags.clone();
            prop_assert!(!tags.add(t));
            prop_assert_eq!(tags, once);
        }
    }
}

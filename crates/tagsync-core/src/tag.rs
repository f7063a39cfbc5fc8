//! Tag identifiers
//!
//! A tag is an opaque, immutable marker. Equality is exact string
//! comparison. Dot-delimited names (`Status.Stunned`) are a convention
//! only; nothing in the mutation path matches on hierarchy.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use crate::{TagFault, TagSyncError, TagSyncResult};

/// Maximum encoded length of a tag in bytes (fits the 1-byte wire prefix)
pub const MAX_TAG_LEN: usize = 255;

/// Segment separator used by the naming convention
pub const TAG_SEPARATOR: char = '.';

/// Well-formed tag identifier
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    /// Create a tag, rejecting anything that is not well-formed
    pub fn new(name: impl Into<String>) -> TagSyncResult<Self> {
        let name = name.into();
        match check(&name) {
            Ok(()) => Ok(Tag(name)),
            Err(fault) => Err(TagSyncError::InvalidTag { tag: name, fault }),
        }
    }

    /// Check whether a string would make a valid tag
    pub fn is_well_formed(name: &str) -> bool {
        check(name).is_ok()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dot-delimited segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(TAG_SEPARATOR)
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// True if `self` equals `ancestor` or lies below it in the naming convention.
    ///
    /// Only meant for validator policies; set membership never uses it.
    pub fn is_descendant_of(&self, ancestor: &Tag) -> bool {
        match self.0.strip_prefix(ancestor.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with(TAG_SEPARATOR),
            None => false,
        }
    }
}

fn check(name: &str) -> Result<(), TagFault> {
    if name.is_empty() {
        return Err(TagFault::Empty);
    }
    if name.len() > MAX_TAG_LEN {
        return Err(TagFault::TooLong(name.len()));
    }
    if let Some(c) = name.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(TagFault::ForbiddenChar(c));
    }
    if name.split(TAG_SEPARATOR).any(str::is_empty) {
        return Err(TagFault::EmptySegment);
    }
    Ok(())
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Tag {
    type Err = TagSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::new(s)
    }
}

impl TryFrom<&str> for Tag {
    type Error = TagSyncError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Tag::new(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = TagSyncError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Tag::new(s)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Tag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

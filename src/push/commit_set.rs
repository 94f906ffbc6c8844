//! push::commit_set
//!
//! An immutable set of full object ids with abbreviation-tolerant lookup.

use crate::core::types::Oid;

/// A sorted, immutable set of commit ids.
///
/// [`CommitSet::contains`] accepts any non-empty prefix of a stored id, so
/// abbreviated ids from one-line summaries can be looked up directly.
///
/// # Example
///
/// ```
/// use pushmail::core::types::Oid;
/// use pushmail::push::CommitSet;
///
/// let set = CommitSet::new([Oid::new("abcdef0123456789abcdef0123456789abcdef01").unwrap()]);
/// assert!(set.contains("abcdef01"));
/// assert!(!set.contains("abcdee"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSet {
    ids: Vec<Oid>,
}

impl CommitSet {
    /// Build a set from full ids. Duplicates are collapsed.
    pub fn new(ids: impl IntoIterator<Item = Oid>) -> Self {
        let mut ids: Vec<Oid> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        Self { ids }
    }

    /// Whether some stored id starts with `prefix`.
    pub fn contains(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return false;
        }
        let prefix = prefix.to_ascii_lowercase();
        let index = self.ids.partition_point(|id| id.as_str() < prefix.as_str());
        self.ids
            .get(index)
            .is_some_and(|id| id.as_str().starts_with(prefix.as_str()))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Stored ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &Oid> {
        self.ids.iter()
    }
}

impl FromIterator<Oid> for CommitSet {
    fn from_iter<I: IntoIterator<Item = Oid>>(iter: I) -> Self {
        Self::new(iter)
    }
}

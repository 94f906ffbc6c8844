//! git::oracle
//!
//! The object/reachability oracle consulted while accounting for a push.
//!
//! # Design
//!
//! Everything the push engine needs to know about the repository is asked
//! through the [`Oracle`] trait. The production implementation is
//! [`crate::git::Git`] (backed by `git2`); tests use
//! [`crate::git::mock::MockRepo`], an in-memory commit graph.
//!
//! Calls are blocking and run to completion. A failing call is fatal for
//! the push unless the caller explicitly tolerates absence, in which case
//! the method returns `Option` instead of an error.

use crate::core::types::{ObjectType, Oid, RefName};

use super::GitError;

/// A ref with its name, target and the type of the target object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    /// The full ref name
    pub name: RefName,
    /// The object the ref points to (not peeled)
    pub oid: Oid,
    /// Type of the object the ref points to
    pub kind: ObjectType,
}

/// Order in which [`Oracle::rev_list`] returns commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// Children before parents, newer commits first.
    NewestFirst,
    /// The reverse of `NewestFirst`.
    OldestFirst,
}

/// Abbreviated id plus subject line of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub short: String,
    pub subject: String,
}

/// Information about a commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// Parent OIDs (empty for root commits)
    pub parents: Vec<Oid>,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    /// Author name
    pub author_name: String,
    /// Author email (may be empty)
    pub author_email: String,
    /// Author timestamp, in the author's offset
    pub author_time: chrono::DateTime<chrono::FixedOffset>,
}

impl CommitInfo {
    /// `Name <email>`, or `None` when the commit carries no email.
    pub fn author_identity(&self) -> Option<String> {
        if self.author_email.trim().is_empty() {
            None
        } else {
            Some(format!("{} <{}>", self.author_name, self.author_email))
        }
    }
}

/// Metadata of an annotated tag object.
#[derive(Debug, Clone)]
pub struct TagInfo {
    /// The tag object itself
    pub oid: Oid,
    /// The object the tag points at
    pub target: Oid,
    /// Type of the tagged object
    pub target_kind: ObjectType,
    /// Tagger name, if the tag has a tagger
    pub tagger: Option<String>,
    /// Tagging date, if the tag has a tagger
    pub date: Option<chrono::DateTime<chrono::FixedOffset>>,
    /// The tag message (everything after the tag header)
    pub message: String,
}

/// The annotated tag an annotated tag appears to replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousTag {
    /// Tag name (without `refs/tags/`)
    pub name: String,
    /// Commit the previous tag points at
    pub commit: Oid,
}

/// Read-only queries against the repository that received the push.
pub trait Oracle {
    /// Type of the object named by `oid`.
    fn object_type(&self, oid: &Oid) -> Result<ObjectType, GitError>;

    /// Peel a tag (possibly nested) to the commit it points at.
    ///
    /// Returns `Ok(None)` when the chain ends at something other than a
    /// commit or is dangling.
    fn peel_to_commit(&self, oid: &Oid) -> Result<Option<Oid>, GitError>;

    /// Unambiguous abbreviation of `oid`.
    fn short_id(&self, oid: &Oid) -> Result<String, GitError>;

    /// Every ref in the repository with its current target.
    fn list_refs(&self) -> Result<Vec<RefEntry>, GitError>;

    /// Commits reachable from `include` but not from `exclude`.
    fn rev_list(
        &self,
        include: &[Oid],
        exclude: &[Oid],
        order: WalkOrder,
    ) -> Result<Vec<Oid>, GitError>;

    /// Author, message and parents of a commit.
    fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError>;

    /// Diff-stat followed by the patch of a commit against its first parent.
    fn commit_patch(&self, oid: &Oid) -> Result<Vec<String>, GitError>;

    /// Diff-stat (with summary of created/deleted files) between two commits.
    fn diff_stat(&self, old: &Oid, new: &Oid) -> Result<Vec<String>, GitError>;

    /// Fields of an annotated tag object.
    fn tag_info(&self, oid: &Oid) -> Result<TagInfo, GitError>;

    /// The nearest annotated tag reachable from the parent of `commit`.
    fn previous_tag(&self, commit: &Oid) -> Result<Option<PreviousTag>, GitError>;

    /// Size in bytes of an object.
    fn object_size(&self, oid: &Oid) -> Result<usize, GitError>;

    /// Resolve a revision expression (`HEAD~1`, a ref name, a full id).
    fn resolve_revision(&self, spec: &str) -> Result<Oid, GitError>;

    /// Abbreviated id and subject of one commit.
    fn summary(&self, oid: &Oid) -> Result<CommitSummary, GitError> {
        let info = self.commit_info(oid)?;
        Ok(CommitSummary {
            short: self.short_id(oid)?,
            subject: info.summary,
        })
    }

    /// [`Oracle::rev_list`] rendered as one-line summaries.
    fn summaries(
        &self,
        include: &[Oid],
        exclude: &[Oid],
        order: WalkOrder,
    ) -> Result<Vec<CommitSummary>, GitError> {
        self.rev_list(include, exclude, order)?
            .iter()
            .map(|oid| self.summary(oid))
            .collect()
    }
}

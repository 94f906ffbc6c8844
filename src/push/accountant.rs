//! push::accountant
//!
//! Push-wide commit accounting.
//!
//! # Design
//!
//! A push is accounted for as a whole so that a commit reachable from
//! several updated refs is announced exactly once:
//!
//! 1. The **baseline** is the set of commits named by refs the push did not
//!    touch, read once when the [`Push`] is built.
//! 2. The **old exclusion** is the baseline plus every change's old commit;
//!    the **new exclusion** is the baseline plus every change's new commit.
//! 3. New commits (push-wide or per change) are those reachable from the
//!    new endpoints but not from the old exclusion. Discarded commits of a
//!    change are those reachable from its old endpoint but not from the new
//!    exclusion.
//! 4. An [`AttributionPool`] starts with the push-wide new commits. Changes
//!    claim from it in priority order; whatever a change finds already
//!    claimed is "already known" for that change.
//!
//! The refs are read once, early. A concurrent push can still move refs
//! between that read and the later reachability queries.

use std::collections::BTreeSet;

use super::change::Change;
use super::commit_set::CommitSet;
use crate::core::types::{ObjectType, Oid};
use crate::git::{GitError, Oracle, WalkOrder};

/// The changes of one push plus the derived exclusion specs.
#[derive(Debug, Clone)]
pub struct Push {
    changes: Vec<Change>,
    baseline: Vec<Oid>,
    old_exclusion: Vec<Oid>,
    new_exclusion: Vec<Oid>,
}

impl Push {
    /// Build the push, sorting changes into processing order and reading
    /// the targets of all refs not touched by it.
    pub fn new(oracle: &dyn Oracle, mut changes: Vec<Change>) -> Result<Self, GitError> {
        changes.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let updated: BTreeSet<&str> = changes.iter().map(|c| c.refname.as_str()).collect();
        let mut baseline = BTreeSet::new();
        for entry in oracle.list_refs()? {
            if updated.contains(entry.name.as_str()) {
                continue;
            }
            let commit = match entry.kind {
                ObjectType::Commit => Some(entry.oid),
                ObjectType::Tag => oracle.peel_to_commit(&entry.oid)?,
                _ => None,
            };
            baseline.extend(commit);
        }

        let old_exclusion = baseline
            .iter()
            .cloned()
            .chain(changes.iter().filter_map(|c| c.old.commit.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let new_exclusion = baseline
            .iter()
            .cloned()
            .chain(changes.iter().filter_map(|c| c.new.commit.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(Self {
            changes,
            baseline: baseline.into_iter().collect(),
            old_exclusion,
            new_exclusion,
        })
    }

    /// Changes in processing order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Commits named by refs this push did not touch, ascending.
    pub fn baseline(&self) -> &[Oid] {
        &self.baseline
    }

    pub fn old_exclusion(&self) -> &[Oid] {
        &self.old_exclusion
    }

    pub fn new_exclusion(&self) -> &[Oid] {
        &self.new_exclusion
    }

    /// Every commit this push introduces to the repository.
    pub fn new_commits(&self, oracle: &dyn Oracle) -> Result<Vec<Oid>, GitError> {
        let tips: Vec<Oid> = self
            .changes
            .iter()
            .filter_map(|c| c.new.commit.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        oracle.rev_list(&tips, &self.old_exclusion, WalkOrder::NewestFirst)
    }

    /// Commits new to the repository that `change`'s new endpoint reaches,
    /// oldest first.
    pub fn new_commits_for(
        &self,
        oracle: &dyn Oracle,
        change: &Change,
    ) -> Result<Vec<Oid>, GitError> {
        match &change.new.commit {
            Some(tip) => {
                oracle.rev_list(std::slice::from_ref(tip), &self.old_exclusion, WalkOrder::OldestFirst)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Commits that `change` removes from the repository for good,
    /// newest first.
    pub fn discarded_commits_for(
        &self,
        oracle: &dyn Oracle,
        change: &Change,
    ) -> Result<Vec<Oid>, GitError> {
        match &change.old.commit {
            Some(tip) => {
                oracle.rev_list(std::slice::from_ref(tip), &self.new_exclusion, WalkOrder::NewestFirst)
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Commits awaiting announcement, each claimable once.
#[derive(Debug, Clone, Default)]
pub struct AttributionPool {
    unclaimed: BTreeSet<Oid>,
}

impl AttributionPool {
    pub fn new(commits: impl IntoIterator<Item = Oid>) -> Self {
        Self {
            unclaimed: commits.into_iter().collect(),
        }
    }

    /// Claim every candidate still in the pool, preserving candidate order.
    pub fn claim(&mut self, candidates: &[Oid]) -> Vec<Oid> {
        candidates
            .iter()
            .filter(|oid| self.unclaimed.remove(*oid))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.unclaimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unclaimed.is_empty()
    }

    /// Commits nobody claimed, ascending.
    pub fn into_leftover(self) -> Vec<Oid> {
        self.unclaimed.into_iter().collect()
    }
}

/// Commit accounting for one change, as seen by the composer.
#[derive(Debug, Clone, Default)]
pub struct ChangeCommits {
    /// Commits this change announces, oldest first
    pub claimed: Vec<Oid>,
    /// `claimed` as a lookup set
    pub claimed_set: CommitSet,
    /// New to the repository via this change's endpoint, oldest first;
    /// includes commits claimed by earlier changes
    pub reachable_new: Vec<Oid>,
    /// Commits permanently removed by this change, newest first
    pub discarded: Vec<Oid>,
    /// `discarded` as a lookup set
    pub discarded_set: CommitSet,
}

impl ChangeCommits {
    /// Run the accounting for `change`, claiming from `pool`.
    pub fn account(
        oracle: &dyn Oracle,
        push: &Push,
        change: &Change,
        pool: &mut AttributionPool,
    ) -> Result<Self, GitError> {
        let reachable_new = push.new_commits_for(oracle, change)?;
        let claimed = pool.claim(&reachable_new);
        let discarded = push.discarded_commits_for(oracle, change)?;

        Ok(Self {
            claimed_set: CommitSet::new(claimed.iter().cloned()),
            claimed,
            reachable_new,
            discarded_set: CommitSet::new(discarded.iter().cloned()),
            discarded,
        })
    }

    /// One [`Revision`] per claimed commit, numbered 1..N oldest first.
    pub fn revisions<'a>(&self, change: &'a Change, recipients: &[String]) -> Vec<Revision<'a>> {
        let tot = self.claimed.len();
        self.claimed
            .iter()
            .enumerate()
            .map(|(i, commit)| Revision {
                change,
                commit: commit.clone(),
                num: i + 1,
                tot,
                recipients: recipients.to_vec(),
            })
            .collect()
    }
}

/// One announced commit.
#[derive(Debug, Clone)]
pub struct Revision<'a> {
    /// The change that claimed the commit
    pub change: &'a Change,
    pub commit: Oid,
    /// 1-based position among the commits the change claimed
    pub num: usize,
    pub tot: usize,
    pub recipients: Vec<String>,
}

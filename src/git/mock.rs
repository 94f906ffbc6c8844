//! git::mock
//!
//! In-memory repository for deterministic testing.
//!
//! # Design
//!
//! `MockRepo` implements [`Oracle`] over a hand-built commit graph. Object
//! ids are generated deterministically, commit timestamps increase with
//! creation order, and refs are a plain map, so a test can lay out the
//! "after push" state of a repository in a few lines and then run the push
//! engine against it.
//!
//! # Example
//!
//! ```
//! use pushmail::git::mock::MockRepo;
//! use pushmail::git::{Oracle, WalkOrder};
//!
//! let mut repo = MockRepo::new();
//! let a = repo.commit("first", &[]);
//! let b = repo.commit("second", &[a.clone()]);
//! repo.set_ref("refs/heads/main", &b);
//!
//! let listed = repo.rev_list(&[b.clone()], &[a.clone()], WalkOrder::NewestFirst).unwrap();
//! assert_eq!(listed, vec![b]);
//! ```

use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};

use chrono::{DateTime, Utc};

use super::oracle::{CommitInfo, Oracle, PreviousTag, RefEntry, TagInfo, WalkOrder};
use super::GitError;
use crate::core::types::{ObjectType, Oid, RefName};

/// Epoch of the first mock commit; each later object is one minute newer.
const BASE_TIME: i64 = 1_700_000_000;

/// Oracle operation that should fail (for testing error paths).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    ListRefs,
    RevList,
    CommitInfo,
}

#[derive(Debug, Clone)]
enum MockObject {
    Commit(MockCommit),
    Tag(MockTag),
    Tree,
    Blob { size: usize },
}

#[derive(Debug, Clone)]
struct MockCommit {
    seq: u32,
    parents: Vec<Oid>,
    message: String,
    author_name: String,
    author_email: String,
}

#[derive(Debug, Clone)]
struct MockTag {
    seq: u32,
    name: String,
    target: Oid,
    tagger: String,
    message: String,
}

/// Mock repository for testing.
#[derive(Debug, Clone, Default)]
pub struct MockRepo {
    objects: BTreeMap<Oid, MockObject>,
    refs: BTreeMap<RefName, Oid>,
    next_seq: u32,
    fail_on: Option<FailOn>,
}

impl MockRepo {
    /// Create a new empty mock repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh object id.
    ///
    /// The leading eight hex digits are a bijective scramble of the sequence
    /// number, so abbreviated ids stay distinct and unordered.
    fn allocate(&mut self) -> (u32, Oid) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let scrambled = seq.wrapping_mul(0x9E37_79B1);
        let oid = Oid::new(format!("{scrambled:08x}{seq:032x}")).expect("generated ids are hex");
        (seq, oid)
    }

    /// Create a commit authored by the default test identity.
    pub fn commit(&mut self, subject: &str, parents: &[Oid]) -> Oid {
        self.commit_by(subject, parents, "A U Thor", "author@example.com")
    }

    /// Create a commit with an explicit author.
    pub fn commit_by(&mut self, subject: &str, parents: &[Oid], name: &str, email: &str) -> Oid {
        let (seq, oid) = self.allocate();
        self.objects.insert(
            oid.clone(),
            MockObject::Commit(MockCommit {
                seq,
                parents: parents.to_vec(),
                message: format!("{subject}\n"),
                author_name: name.to_string(),
                author_email: email.to_string(),
            }),
        );
        oid
    }

    /// Create an annotated tag object (no ref is written).
    pub fn tag_object(&mut self, name: &str, target: &Oid, message: &str) -> Oid {
        let (seq, oid) = self.allocate();
        self.objects.insert(
            oid.clone(),
            MockObject::Tag(MockTag {
                seq,
                name: name.to_string(),
                target: target.clone(),
                tagger: "Tag Ger".to_string(),
                message: message.to_string(),
            }),
        );
        oid
    }

    /// Create a tree object.
    pub fn tree(&mut self) -> Oid {
        let (_, oid) = self.allocate();
        self.objects.insert(oid.clone(), MockObject::Tree);
        oid
    }

    /// Create a blob object of the given size.
    pub fn blob(&mut self, size: usize) -> Oid {
        let (_, oid) = self.allocate();
        self.objects.insert(oid.clone(), MockObject::Blob { size });
        oid
    }

    /// Point a ref at an object.
    pub fn set_ref(&mut self, name: &str, oid: &Oid) {
        let name = RefName::new(name).expect("test ref names are valid");
        self.refs.insert(name, oid.clone());
    }

    /// Remove a ref.
    pub fn delete_ref(&mut self, name: &str) {
        self.refs.retain(|refname, _| refname.as_str() != name);
    }

    /// Make the given operation fail from now on.
    pub fn fail_on(&mut self, op: FailOn) {
        self.fail_on = Some(op);
    }

    fn check(&self, op: FailOn) -> Result<(), GitError> {
        if self.fail_on == Some(op) {
            return Err(GitError::Internal {
                message: format!("injected failure in {:?}", op),
            });
        }
        Ok(())
    }

    fn object(&self, oid: &Oid) -> Result<&MockObject, GitError> {
        self.objects.get(oid).ok_or_else(|| GitError::ObjectNotFound {
            oid: oid.to_string(),
        })
    }

    fn commit_of(&self, oid: &Oid) -> Result<&MockCommit, GitError> {
        match self.object(oid)? {
            MockObject::Commit(commit) => Ok(commit),
            _ => Err(GitError::UnexpectedObject {
                oid: oid.to_string(),
                expected: ObjectType::Commit,
            }),
        }
    }

    /// Every commit reachable from `starts` (tags are peeled first).
    fn ancestors(&self, starts: &[Oid]) -> Result<BTreeSet<Oid>, GitError> {
        let mut seen = BTreeSet::new();
        let mut stack = Vec::new();
        for start in starts {
            if let Some(commit) = self.peel_to_commit(start)? {
                stack.push(commit);
            } else {
                self.object(start)?;
            }
        }

        while let Some(oid) = stack.pop() {
            if !seen.insert(oid.clone()) {
                continue;
            }
            stack.extend(self.commit_of(&oid)?.parents.iter().cloned());
        }

        Ok(seen)
    }

    fn time_of(seq: u32) -> DateTime<chrono::FixedOffset> {
        DateTime::<Utc>::from_timestamp(BASE_TIME + i64::from(seq) * 60, 0)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            .fixed_offset()
    }
}

impl Oracle for MockRepo {
    fn object_type(&self, oid: &Oid) -> Result<ObjectType, GitError> {
        Ok(match self.object(oid)? {
            MockObject::Commit(_) => ObjectType::Commit,
            MockObject::Tag(_) => ObjectType::Tag,
            MockObject::Tree => ObjectType::Tree,
            MockObject::Blob { .. } => ObjectType::Blob,
        })
    }

    fn peel_to_commit(&self, oid: &Oid) -> Result<Option<Oid>, GitError> {
        let mut current = oid.clone();
        loop {
            match self.objects.get(&current) {
                Some(MockObject::Commit(_)) => return Ok(Some(current)),
                Some(MockObject::Tag(tag)) => current = tag.target.clone(),
                _ => return Ok(None),
            }
        }
    }

    fn short_id(&self, oid: &Oid) -> Result<String, GitError> {
        self.object(oid)?;
        Ok(oid.short(7).to_string())
    }

    fn list_refs(&self) -> Result<Vec<RefEntry>, GitError> {
        self.check(FailOn::ListRefs)?;
        self.refs
            .iter()
            .map(|(name, oid)| {
                Ok(RefEntry {
                    name: name.clone(),
                    oid: oid.clone(),
                    kind: self.object_type(oid)?,
                })
            })
            .collect()
    }

    fn rev_list(
        &self,
        include: &[Oid],
        exclude: &[Oid],
        order: WalkOrder,
    ) -> Result<Vec<Oid>, GitError> {
        self.check(FailOn::RevList)?;
        let hidden = self.ancestors(exclude)?;
        let selected: BTreeSet<Oid> = self
            .ancestors(include)?
            .into_iter()
            .filter(|oid| !hidden.contains(oid))
            .collect();

        // Children before parents; among ready commits the newest goes first.
        let mut pending: HashMap<&Oid, usize> = selected.iter().map(|oid| (oid, 0)).collect();
        for oid in &selected {
            for parent in &self.commit_of(oid)?.parents {
                if let Some(count) = pending.get_mut(parent) {
                    *count += 1;
                }
            }
        }

        let mut ready: BinaryHeap<(u32, &Oid)> = BinaryHeap::new();
        for (oid, count) in &pending {
            if *count == 0 {
                ready.push((self.commit_of(oid)?.seq, *oid));
            }
        }

        let mut listed = Vec::with_capacity(selected.len());
        while let Some((_, oid)) = ready.pop() {
            listed.push(oid.clone());
            for parent in &self.commit_of(oid)?.parents {
                if let Some(count) = pending.get_mut(parent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push((self.commit_of(parent)?.seq, parent));
                    }
                }
            }
        }

        if order == WalkOrder::OldestFirst {
            listed.reverse();
        }
        Ok(listed)
    }

    fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        self.check(FailOn::CommitInfo)?;
        let commit = self.commit_of(oid)?;
        Ok(CommitInfo {
            oid: oid.clone(),
            parents: commit.parents.clone(),
            summary: commit.message.lines().next().unwrap_or("").to_string(),
            message: commit.message.clone(),
            author_name: commit.author_name.clone(),
            author_email: commit.author_email.clone(),
            author_time: Self::time_of(commit.seq),
        })
    }

    fn commit_patch(&self, oid: &Oid) -> Result<Vec<String>, GitError> {
        let commit = self.commit_of(oid)?;
        Ok(vec![
            format!(" file-{} | 1 +", oid.short(7)),
            " 1 file changed, 1 insertion(+)".to_string(),
            String::new(),
            format!("+{}", commit.message.trim_end()),
        ])
    }

    fn diff_stat(&self, old: &Oid, new: &Oid) -> Result<Vec<String>, GitError> {
        self.commit_of(old)?;
        self.commit_of(new)?;
        Ok(vec![format!(
            " mock diff {}..{} | 1 +",
            old.short(7),
            new.short(7)
        )])
    }

    fn tag_info(&self, oid: &Oid) -> Result<TagInfo, GitError> {
        match self.object(oid)? {
            MockObject::Tag(tag) => Ok(TagInfo {
                oid: oid.clone(),
                target: tag.target.clone(),
                target_kind: self.object_type(&tag.target)?,
                tagger: Some(tag.tagger.clone()),
                date: Some(Self::time_of(tag.seq)),
                message: tag.message.clone(),
            }),
            _ => Err(GitError::UnexpectedObject {
                oid: oid.to_string(),
                expected: ObjectType::Tag,
            }),
        }
    }

    fn previous_tag(&self, commit: &Oid) -> Result<Option<PreviousTag>, GitError> {
        let parent = match self.commit_of(commit)?.parents.first() {
            Some(parent) => parent.clone(),
            None => return Ok(None),
        };

        // Annotated tags only, keyed by the commit they peel to
        let mut tagged: BTreeMap<Oid, Vec<&str>> = BTreeMap::new();
        for (name, target) in &self.refs {
            if let (Some(short), Some(MockObject::Tag(_))) =
                (name.as_str().strip_prefix("refs/tags/"), self.objects.get(target))
            {
                if let Some(peeled) = self.peel_to_commit(target)? {
                    tagged.entry(peeled).or_default().push(short);
                }
            }
        }

        for candidate in self.rev_list(&[parent], &[], WalkOrder::NewestFirst)? {
            if let Some(names) = tagged.get(&candidate) {
                let name = names.iter().min().copied().unwrap_or_default();
                return Ok(Some(PreviousTag {
                    name: name.to_string(),
                    commit: candidate,
                }));
            }
        }
        Ok(None)
    }

    fn object_size(&self, oid: &Oid) -> Result<usize, GitError> {
        Ok(match self.object(oid)? {
            MockObject::Commit(commit) => commit.message.len(),
            MockObject::Tag(tag) => tag.message.len(),
            MockObject::Tree => 0,
            MockObject::Blob { size } => *size,
        })
    }

    fn resolve_revision(&self, spec: &str) -> Result<Oid, GitError> {
        if let Ok(oid) = Oid::new(spec) {
            return Ok(oid);
        }
        let candidates = [spec.to_string(), format!("refs/heads/{spec}")];
        candidates
            .iter()
            .find_map(|name| {
                self.refs
                    .iter()
                    .find(|(refname, _)| refname.as_str() == name)
                    .map(|(_, oid)| oid.clone())
            })
            .ok_or_else(|| GitError::RefNotFound {
                refname: spec.to_string(),
            })
    }
}

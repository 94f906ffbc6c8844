//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to the repository that
//! received a push. All object lookups, ref enumeration and history walks
//! flow through the [`Git`] struct, which implements [`Oracle`] and
//! normalizes `git2` failures into typed [`GitError`] categories.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref or revision does not exist
//! - [`GitError::ObjectNotFound`]: Requested object does not exist
//! - [`GitError::UnexpectedObject`]: Object exists but has the wrong type
//!
//! # Example
//!
//! ```ignore
//! use pushmail::git::{Git, Oracle, WalkOrder};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let head = git.resolve_revision("HEAD")?;
//! for oid in git.rev_list(&[head], &[], WalkOrder::NewestFirst)? {
//!     println!("{}", git.short_id(&oid)?);
//! }
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, TimeZone};
use thiserror::Error;

use super::oracle::{CommitInfo, Oracle, PreviousTag, RefEntry, TagInfo, WalkOrder};
use crate::core::types::{ObjectType, Oid, RefName, TypeError};

/// Width of the diff-stat graph, matching git's default for mail output.
const STAT_WIDTH: usize = 72;

/// Errors from Git operations.
///
/// Any of these reaching the push engine aborts the run; call sites that
/// tolerate absence translate the relevant variants into `None` first.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("not a git repository: {path}")]
    NotARepo { path: PathBuf },

    /// A revision expression or ref name resolved to nothing.
    #[error("ref not found: {refname}")]
    RefNotFound { refname: String },

    #[error("object not found: {oid}")]
    ObjectNotFound { oid: String },

    /// The object exists but is not of the requested type.
    #[error("object {oid} is not a {expected}")]
    UnexpectedObject { oid: String, expected: ObjectType },

    /// The repository handed back an id or name pushmail cannot represent.
    #[error(transparent)]
    Invalid(#[from] TypeError),

    #[error("git error: {message}")]
    Internal { message: String },
}

impl GitError {
    /// Classify a git2 failure concerning `oid`.
    fn from_git2(err: git2::Error, oid: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::ObjectNotFound {
                oid: oid.to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", oid, err.message()),
            },
        }
    }

    fn internal(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

/// Information about a Git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Path to the git directory (the repository itself when bare)
    pub git_dir: PathBuf,
    /// Path to working directory, `None` for bare repositories
    pub work_dir: Option<PathBuf>,
    /// First line of `<git-dir>/description`, if readable
    pub description: Option<String>,
    /// `user.name` from the repository's git configuration
    pub user_name: Option<String>,
    /// `user.email` from the repository's git configuration
    pub user_email: Option<String>,
}

impl RepoInfo {
    /// The directory that names the repository: the git directory for bare
    /// repositories, else the top of the working tree.
    pub fn repo_path(&self) -> &Path {
        self.work_dir.as_deref().unwrap_or(&self.git_dir)
    }
}

/// The Git interface.
///
/// This is the **single point of interaction** with Git. Hooks usually run
/// inside bare repositories, so unlike most tools this interface accepts
/// them.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover` to find the repository root, so
    /// `path` can be any directory within the repository (or the bare
    /// repository directory a hook runs in).
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        Ok(Self { repo })
    }

    /// Get repository information.
    ///
    /// Missing description or identity settings are reported as `None`.
    pub fn info(&self) -> Result<RepoInfo, GitError> {
        let git_dir = self.repo.path().to_path_buf();
        let work_dir = self.repo.workdir().map(Path::to_path_buf);

        let description = std::fs::read_to_string(git_dir.join("description"))
            .ok()
            .and_then(|s| s.lines().next().map(|l| l.trim().to_string()));

        let config = self.repo.config().map_err(GitError::internal)?;
        let user_name = config.get_string("user.name").ok();
        let user_email = config.get_string("user.email").ok();

        Ok(RepoInfo {
            git_dir,
            work_dir,
            description,
            user_name,
            user_email,
        })
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    fn to_git2(oid: &Oid) -> Result<git2::Oid, GitError> {
        git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    fn from_git2_oid(oid: git2::Oid) -> Result<Oid, GitError> {
        Ok(Oid::new(oid.to_string())?)
    }

    fn object_kind(kind: Option<git2::ObjectType>) -> ObjectType {
        match kind {
            Some(git2::ObjectType::Commit) => ObjectType::Commit,
            Some(git2::ObjectType::Tag) => ObjectType::Tag,
            Some(git2::ObjectType::Tree) => ObjectType::Tree,
            Some(git2::ObjectType::Blob) => ObjectType::Blob,
            _ => ObjectType::None,
        }
    }

    fn signature_time(time: git2::Time) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
            .or_else(|| FixedOffset::east_opt(0));
        match offset.and_then(|o| o.timestamp_opt(time.seconds(), 0).single()) {
            Some(dt) => dt,
            None => DateTime::<chrono::Utc>::UNIX_EPOCH.fixed_offset(),
        }
    }

    fn find_commit(&self, oid: &Oid) -> Result<git2::Commit<'_>, GitError> {
        self.repo
            .find_commit(Self::to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    /// Render a diff's stat block (including the create/delete summary).
    fn stat_lines(diff: &git2::Diff<'_>) -> Result<Vec<String>, GitError> {
        let stats = diff.stats().map_err(GitError::internal)?;
        let format = git2::DiffStatsFormat::FULL | git2::DiffStatsFormat::INCLUDE_SUMMARY;
        let buf = stats
            .to_buf(format, STAT_WIDTH)
            .map_err(GitError::internal)?;

        Ok(String::from_utf8_lossy(&buf)
            .lines()
            .map(str::to_string)
            .collect())
    }

    /// Diff two trees with copy and rename detection.
    fn tree_diff(
        &self,
        old: Option<&git2::Tree<'_>>,
        new: &git2::Tree<'_>,
    ) -> Result<git2::Diff<'_>, GitError> {
        let mut diff = self
            .repo
            .diff_tree_to_tree(old, Some(new), None)
            .map_err(GitError::internal)?;

        let mut find = git2::DiffFindOptions::new();
        find.renames(true).copies(true).copies_from_unmodified(true);
        diff.find_similar(Some(&mut find))
            .map_err(GitError::internal)?;

        Ok(diff)
    }
}

impl Oracle for Git {
    fn object_type(&self, oid: &Oid) -> Result<ObjectType, GitError> {
        let object = self
            .repo
            .find_object(Self::to_git2(oid)?, None)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        Ok(Self::object_kind(object.kind()))
    }

    fn peel_to_commit(&self, oid: &Oid) -> Result<Option<Oid>, GitError> {
        let object = match self.repo.find_object(Self::to_git2(oid)?, None) {
            Ok(object) => object,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, oid.as_str())),
        };

        match object.peel_to_commit() {
            Ok(commit) => Ok(Some(Self::from_git2_oid(commit.id())?)),
            // Tags of trees or blobs, and dangling tags
            Err(_) => Ok(None),
        }
    }

    fn short_id(&self, oid: &Oid) -> Result<String, GitError> {
        let object = self
            .repo
            .find_object(Self::to_git2(oid)?, None)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        let short = object.short_id().map_err(GitError::internal)?;

        Ok(short.as_str().unwrap_or(oid.short(7)).to_string())
    }

    fn list_refs(&self) -> Result<Vec<RefEntry>, GitError> {
        let refs = self.repo.references().map_err(GitError::internal)?;

        let mut entries = Vec::new();
        for reference in refs {
            let reference = reference.map_err(GitError::internal)?;

            // Skip refs with non-UTF8 names
            let name = match reference.name() {
                Some(n) => n.to_string(),
                None => continue,
            };
            let ref_name = match RefName::new(name) {
                Ok(r) => r,
                Err(_) => continue,
            };

            // Symbolic refs are listed under their final target; dangling
            // ones are skipped as for-each-ref does
            let resolved = match reference.resolve() {
                Ok(resolved) => resolved,
                Err(e) if e.code() == git2::ErrorCode::NotFound => continue,
                Err(e) => return Err(GitError::internal(e)),
            };
            let target = match resolved.target() {
                Some(oid) => oid,
                None => continue,
            };
            let kind = self
                .repo
                .find_object(target, None)
                .map(|o| Self::object_kind(o.kind()))
                .map_err(|e| GitError::from_git2(e, &target.to_string()))?;

            entries.push(RefEntry {
                name: ref_name,
                oid: Self::from_git2_oid(target)?,
                kind,
            });
        }

        Ok(entries)
    }

    fn rev_list(
        &self,
        include: &[Oid],
        exclude: &[Oid],
        order: WalkOrder,
    ) -> Result<Vec<Oid>, GitError> {
        if include.is_empty() {
            return Ok(Vec::new());
        }

        let mut revwalk = self.repo.revwalk().map_err(GitError::internal)?;
        let mut sort = git2::Sort::TOPOLOGICAL | git2::Sort::TIME;
        if order == WalkOrder::OldestFirst {
            sort |= git2::Sort::REVERSE;
        }
        revwalk.set_sorting(sort).map_err(GitError::internal)?;

        for oid in include {
            revwalk
                .push(Self::to_git2(oid)?)
                .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        }
        for oid in exclude {
            revwalk
                .hide(Self::to_git2(oid)?)
                .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        }

        revwalk
            .map(|oid| Self::from_git2_oid(oid.map_err(GitError::internal)?))
            .collect()
    }

    fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let commit = self.find_commit(oid)?;
        let author = commit.author();

        let parents = commit
            .parent_ids()
            .map(Self::from_git2_oid)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CommitInfo {
            oid: oid.clone(),
            parents,
            summary: commit.summary().unwrap_or("").to_string(),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            author_time: Self::signature_time(author.when()),
        })
    }

    fn commit_patch(&self, oid: &Oid) -> Result<Vec<String>, GitError> {
        let commit = self.find_commit(oid)?;
        let tree = commit.tree().map_err(GitError::internal)?;
        // Merges are shown against their first parent
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree().map_err(GitError::internal)?),
            Err(_) => None,
        };

        let diff = self.tree_diff(parent_tree.as_ref(), &tree)?;
        let mut lines = Self::stat_lines(&diff)?;
        lines.push(String::new());

        let mut patch = String::new();
        diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                patch.push(line.origin());
            }
            patch.push_str(&String::from_utf8_lossy(line.content()));
            true
        })
        .map_err(GitError::internal)?;

        lines.extend(patch.lines().map(str::to_string));
        Ok(lines)
    }

    fn diff_stat(&self, old: &Oid, new: &Oid) -> Result<Vec<String>, GitError> {
        let old_tree = self.find_commit(old)?.tree().map_err(GitError::internal)?;
        let new_tree = self.find_commit(new)?.tree().map_err(GitError::internal)?;

        let diff = self.tree_diff(Some(&old_tree), &new_tree)?;
        Self::stat_lines(&diff)
    }

    fn tag_info(&self, oid: &Oid) -> Result<TagInfo, GitError> {
        let tag = self
            .repo
            .find_tag(Self::to_git2(oid)?)
            .map_err(|e| match e.code() {
                git2::ErrorCode::NotFound => GitError::ObjectNotFound {
                    oid: oid.to_string(),
                },
                _ => GitError::UnexpectedObject {
                    oid: oid.to_string(),
                    expected: ObjectType::Tag,
                },
            })?;

        let tagger = tag.tagger();
        Ok(TagInfo {
            oid: oid.clone(),
            target: Self::from_git2_oid(tag.target_id())?,
            target_kind: Self::object_kind(tag.target_type()),
            tagger: tagger
                .as_ref()
                .map(|sig| sig.name().unwrap_or("").to_string()),
            date: tagger.as_ref().map(|sig| Self::signature_time(sig.when())),
            message: String::from_utf8_lossy(tag.message_bytes().unwrap_or_default())
                .into_owned(),
        })
    }

    fn previous_tag(&self, commit: &Oid) -> Result<Option<PreviousTag>, GitError> {
        let commit = self.find_commit(commit)?;
        let parent = match commit.parent(0) {
            Ok(parent) => parent,
            Err(_) => return Ok(None),
        };

        // Default describe options only consider annotated tags
        let describe = match parent.as_object().describe(&git2::DescribeOptions::new()) {
            Ok(describe) => describe,
            Err(_) => return Ok(None),
        };
        let mut format = git2::DescribeFormatOptions::new();
        format.abbreviated_size(0);
        let name = describe.format(Some(&format)).map_err(GitError::internal)?;

        let refname = format!("refs/tags/{}", name);
        let tagged = self
            .repo
            .revparse_single(&refname)
            .and_then(|object| object.peel_to_commit())
            .map_err(|_| GitError::RefNotFound { refname })?;

        Ok(Some(PreviousTag {
            name,
            commit: Self::from_git2_oid(tagged.id())?,
        }))
    }

    fn object_size(&self, oid: &Oid) -> Result<usize, GitError> {
        let odb = self.repo.odb().map_err(GitError::internal)?;
        let (size, _) = odb
            .read_header(Self::to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        Ok(size)
    }

    fn resolve_revision(&self, spec: &str) -> Result<Oid, GitError> {
        if let Ok(oid) = Oid::new(spec) {
            return Ok(oid);
        }

        let object = self.repo.revparse_single(spec).map_err(|e| match e.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::InvalidSpec => GitError::RefNotFound {
                refname: spec.to_string(),
            },
            _ => GitError::internal(e),
        })?;
        Self::from_git2_oid(object.id())
    }
}

//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. The push engine never talks
//! to `git2` directly; it asks questions through the [`Oracle`] trait.
//!
//! # Responsibilities
//!
//! - Repository discovery and opening (bare repositories included)
//! - Object type lookup and tag peeling
//! - Ref enumeration
//! - Reachability queries (commits reachable from one set but not another)
//! - Commit, tag and diff rendering inputs
//!
//! # Implementations
//!
//! - [`Git`] - the `git2`-backed oracle used by the binary
//! - [`mock::MockRepo`] - an in-memory commit graph for deterministic tests
//!
//! # Example
//!
//! ```ignore
//! use pushmail::git::{Git, Oracle};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! for entry in git.list_refs()? {
//!     println!("{} {} {}", entry.oid, entry.kind, entry.name);
//! }
//! ```

mod interface;
pub mod mock;
mod oracle;

pub use interface::{Git, GitError, RepoInfo};
pub use oracle::{
    CommitInfo, CommitSummary, Oracle, PreviousTag, RefEntry, TagInfo, WalkOrder,
};

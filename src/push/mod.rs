//! push
//!
//! Accounting for one push: classification, commit attribution and dispatch.
//!
//! # Modules
//!
//! - [`object`] - Resolution of update endpoints
//! - [`commit_set`] - Sorted id set with abbreviation-tolerant lookup
//! - [`change`] - Classification of raw updates into typed changes
//! - [`accountant`] - Push-wide new/discarded commit computation
//! - [`dispatch`] - Processing order, claiming and delivery
//!
//! # Data Flow
//!
//! ```text
//! RawUpdate -> Change::classify -> Push::new -> Dispatcher::run -> Mailer
//! ```

pub mod accountant;
pub mod change;
pub mod commit_set;
pub mod dispatch;
pub mod object;

pub use accountant::{AttributionPool, ChangeCommits, Push, Revision};
pub use change::{Change, ChangeKind, ChangeVariant, Classified, Diagnostic, RawUpdate, PRIORITY};
pub use commit_set::CommitSet;
pub use dispatch::{DispatchReport, Dispatcher};
pub use object::ObjectRef;

use thiserror::Error;

use crate::git::GitError;
use crate::notify::compose::ComposeError;
use crate::notify::mailer::MailError;

/// Errors that abort processing of a push.
#[derive(Debug, Error)]
pub enum PushError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// An input line is not `<old> <new> <refname>`.
    #[error("malformed update '{line}': {reason}")]
    MalformedUpdate { line: String, reason: String },

    /// Both endpoints of an update are the zero id.
    #[error("update of '{refname}' has neither an old nor a new value")]
    EmptyUpdate { refname: String },
}

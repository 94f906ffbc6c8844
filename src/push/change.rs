//! push::change
//!
//! Classification of raw reference updates into typed changes.
//!
//! # Design
//!
//! The variant of a change is decided once, from the type of the object
//! the update points at and the namespace of the ref, and never changes
//! afterwards. Behavior that differs between variants is selected from
//! tables keyed on `(ChangeVariant, ChangeKind)`: [`PRIORITY`] here for
//! processing order, and the summary table in `notify::compose` for
//! message bodies.
//!
//! | endpoint type | area        | variant          |
//! |---------------|-------------|------------------|
//! | tag           | any         | `AnnotatedTag`   |
//! | commit        | `heads`     | `Branch`         |
//! | commit        | `tags`      | `LightweightTag` |
//! | commit        | other       | `Other` + diagnostic |
//! | anything else | any         | `Other` + diagnostic |

use std::fmt;

use uuid::Uuid;

use super::object::ObjectRef;
use super::PushError;
use crate::core::config::RecipientPools;
use crate::core::types::{ObjectType, Oid, RefName};
use crate::git::Oracle;

/// The kind of reference a change affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeVariant {
    Branch,
    AnnotatedTag,
    LightweightTag,
    Other,
}

impl ChangeVariant {
    /// Human-readable reference type used in subjects and headers.
    pub fn refname_type(&self) -> &'static str {
        match self {
            ChangeVariant::Branch => "branch",
            ChangeVariant::AnnotatedTag => "annotated tag",
            ChangeVariant::LightweightTag => "tag",
            ChangeVariant::Other => "reference",
        }
    }
}

impl fmt::Display for ChangeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.refname_type())
    }
}

/// What happened to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    /// Derive the kind from which endpoints exist.
    pub fn from_endpoints(old_present: bool, new_present: bool) -> Option<Self> {
        match (old_present, new_present) {
            (false, true) => Some(ChangeKind::Create),
            (true, true) => Some(ChangeKind::Update),
            (true, false) => Some(ChangeKind::Delete),
            (false, false) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing order of changes within a push.
///
/// Earlier entries claim shared commits first.
pub const PRIORITY: [(ChangeVariant, ChangeKind); 12] = [
    (ChangeVariant::Branch, ChangeKind::Update),
    (ChangeVariant::Branch, ChangeKind::Create),
    (ChangeVariant::AnnotatedTag, ChangeKind::Update),
    (ChangeVariant::AnnotatedTag, ChangeKind::Create),
    (ChangeVariant::LightweightTag, ChangeKind::Update),
    (ChangeVariant::LightweightTag, ChangeKind::Create),
    (ChangeVariant::Branch, ChangeKind::Delete),
    (ChangeVariant::AnnotatedTag, ChangeKind::Delete),
    (ChangeVariant::LightweightTag, ChangeKind::Delete),
    (ChangeVariant::Other, ChangeKind::Update),
    (ChangeVariant::Other, ChangeKind::Create),
    (ChangeVariant::Other, ChangeKind::Delete),
];

fn priority(variant: ChangeVariant, kind: ChangeKind) -> usize {
    PRIORITY
        .iter()
        .position(|entry| *entry == (variant, kind))
        .unwrap_or(PRIORITY.len())
}

/// One line of hook input: `<old> <new> <refname>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawUpdate {
    pub old: Option<Oid>,
    pub new: Option<Oid>,
    pub refname: RefName,
}

impl RawUpdate {
    /// Parse a batch input line.
    pub fn parse(line: &str) -> Result<Self, PushError> {
        let malformed = |reason: String| PushError::MalformedUpdate {
            line: line.to_string(),
            reason,
        };

        let mut parts = line.trim().splitn(3, ' ');
        let (Some(old), Some(new), Some(refname)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("expected '<old> <new> <refname>'".to_string()));
        };

        Ok(Self {
            old: Oid::parse_endpoint(old).map_err(|e| malformed(e.to_string()))?,
            new: Oid::parse_endpoint(new).map_err(|e| malformed(e.to_string()))?,
            refname: RefName::new(refname.trim()).map_err(|e| malformed(e.to_string()))?,
        })
    }
}

/// Advisory message emitted when a change is classified on a degraded path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A commit pushed to `refs/remotes/...`
    TrackingBranch(RefName),
    /// A commit pushed to a namespace other than heads/tags/remotes
    StrangeReference(RefName),
    /// The endpoint is neither a commit nor a tag
    UnknownUpdateType { refname: RefName, kind: ObjectType },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TrackingBranch(refname) => write!(
                f,
                "unusual reference: push-update of tracking branch '{}'; incomplete notification generated",
                refname
            ),
            Diagnostic::StrangeReference(refname) => write!(
                f,
                "unusual reference: push-update of strange reference '{}'; incomplete notification generated",
                refname
            ),
            Diagnostic::UnknownUpdateType { refname, kind } => write!(
                f,
                "unknown update type for '{}' ({}); incomplete notification generated",
                refname, kind
            ),
        }
    }
}

/// A classified reference change.
#[derive(Debug, Clone)]
pub struct Change {
    pub refname: RefName,
    /// Display name: the ref name without `refs/<area>/`, or the full name
    /// for `Other` changes
    pub short_name: String,
    pub variant: ChangeVariant,
    pub kind: ChangeKind,
    pub old: ObjectRef,
    pub new: ObjectRef,
    /// Recipients of the change notification
    pub recipients: Vec<String>,
    /// Message-ID of the change notification; revisions reply to it
    pub msgid: String,
}

/// A change plus the diagnostic its classification produced, if any.
#[derive(Debug, Clone)]
pub struct Classified {
    pub change: Change,
    pub diagnostic: Option<Diagnostic>,
}

impl Change {
    /// Classify a raw update.
    ///
    /// Both endpoints are resolved through the oracle. Recipients are left
    /// empty; see [`Change::assign_recipients`].
    pub fn classify(oracle: &dyn Oracle, update: &RawUpdate) -> Result<Classified, PushError> {
        let kind = ChangeKind::from_endpoints(update.old.is_some(), update.new.is_some())
            .ok_or_else(|| PushError::EmptyUpdate {
                refname: update.refname.to_string(),
            })?;

        let old = ObjectRef::resolve(oracle, update.old.as_ref())?;
        let new = ObjectRef::resolve(oracle, update.new.as_ref())?;
        let rev_kind = if new.is_present() { new.kind } else { old.kind };

        let refname = update.refname.clone();
        let (area, rest) = refname.area().unwrap_or(("", refname.as_str()));

        let (variant, diagnostic) = match (rev_kind, area) {
            (ObjectType::Tag, _) => (ChangeVariant::AnnotatedTag, None),
            (ObjectType::Commit, "heads") => (ChangeVariant::Branch, None),
            (ObjectType::Commit, "tags") => (ChangeVariant::LightweightTag, None),
            (ObjectType::Commit, "remotes") => (
                ChangeVariant::Other,
                Some(Diagnostic::TrackingBranch(refname.clone())),
            ),
            (ObjectType::Commit, _) => (
                ChangeVariant::Other,
                Some(Diagnostic::StrangeReference(refname.clone())),
            ),
            (kind, _) => (
                ChangeVariant::Other,
                Some(Diagnostic::UnknownUpdateType {
                    refname: refname.clone(),
                    kind,
                }),
            ),
        };

        let short_name = match variant {
            ChangeVariant::Other => refname.to_string(),
            _ => rest.to_string(),
        };

        Ok(Classified {
            change: Change {
                short_name,
                variant,
                kind,
                old,
                new,
                recipients: Vec::new(),
                msgid: make_msgid(),
                refname,
            },
            diagnostic,
        })
    }

    /// Take this change's recipients from the pool for its variant.
    ///
    /// Annotated tags use the announcement pool; every other variant uses
    /// the ref-change pool.
    pub fn assign_recipients(&mut self, pools: &RecipientPools) {
        self.recipients = match self.variant {
            ChangeVariant::AnnotatedTag => pools.announce.clone(),
            _ => pools.refchange.clone(),
        };
    }

    /// The endpoint that determines the variant: new if present, else old.
    pub fn rev(&self) -> &ObjectRef {
        if self.new.is_present() {
            &self.new
        } else {
            &self.old
        }
    }

    /// Position of this change's `(variant, kind)` in [`PRIORITY`].
    pub fn priority(&self) -> usize {
        priority(self.variant, self.kind)
    }

    /// Ordering key: priority first, then ref name.
    pub fn sort_key(&self) -> (usize, &RefName) {
        (self.priority(), &self.refname)
    }
}

/// A fresh RFC 2822 Message-ID.
fn make_msgid() -> String {
    let host = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
    format!("<{}@{}>", Uuid::new_v4().simple(), host)
}

//! push::object
//!
//! Resolution of update endpoints to typed object references.
//!
//! # Design
//!
//! A reference update names two endpoints, either of which may be the
//! all-zero "did not exist" sentinel. [`ObjectRef::resolve`] turns an
//! endpoint into its object type and, for commits and tags that peel to a
//! commit, the commit it stands for. The absent endpoint never touches the
//! oracle.

use crate::core::types::{ObjectType, Oid};
use crate::git::{GitError, Oracle};

/// Abbreviation length used for the absent endpoint.
const ABSENT_SHORT_LEN: usize = 7;

/// One endpoint of a reference update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// The object id, `None` for the absent endpoint
    pub id: Option<Oid>,
    /// Type of the object (`ObjectType::None` when absent)
    pub kind: ObjectType,
    /// The commit this object is or peels to
    pub commit: Option<Oid>,
    /// Abbreviated id for display
    pub short: String,
}

impl ObjectRef {
    /// The endpoint of a reference that did not exist.
    pub fn absent() -> Self {
        Self {
            id: None,
            kind: ObjectType::None,
            commit: None,
            short: Oid::zero().short(ABSENT_SHORT_LEN).to_string(),
        }
    }

    /// Resolve an endpoint through the oracle.
    ///
    /// A tag whose chain does not end at a commit resolves with
    /// `commit == None`; only a failing oracle call is an error.
    pub fn resolve(oracle: &dyn Oracle, id: Option<&Oid>) -> Result<Self, GitError> {
        let Some(id) = id else {
            return Ok(Self::absent());
        };

        let kind = oracle.object_type(id)?;
        let commit = match kind {
            ObjectType::Commit => Some(id.clone()),
            ObjectType::Tag => oracle.peel_to_commit(id)?,
            _ => None,
        };

        Ok(Self {
            id: Some(id.clone()),
            kind,
            commit,
            short: oracle.short_id(id)?,
        })
    }

    /// Whether the endpoint names an object.
    pub fn is_present(&self) -> bool {
        self.id.is_some()
    }

    /// Full id for display; the zero id when absent.
    pub fn full(&self) -> String {
        match &self.id {
            Some(id) => id.to_string(),
            None => Oid::zero().to_string(),
        }
    }
}

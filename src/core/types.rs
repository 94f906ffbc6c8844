//! core::types
//!
//! Strong types for the values a push is made of.
//!
//! # Types
//!
//! - [`Oid`] - Full object id, hex, lowercase
//! - [`RefName`] - Validated reference name
//! - [`ObjectType`] - The kind of object an id names, or none at all
//!
//! # Example
//!
//! ```
//! use pushmail::core::types::{Oid, RefName};
//!
//! let refname = RefName::new("refs/heads/main").unwrap();
//! assert_eq!(refname.area(), Some(("heads", "main")));
//!
//! assert!(Oid::new("not-a-sha").is_err());
//! assert!(Oid::parse_endpoint(&"0".repeat(40)).unwrap().is_none());
//! ```

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id '{value}': {reason}")]
    InvalidOid { value: String, reason: &'static str },

    #[error("invalid ref name '{value}': {reason}")]
    InvalidRefName { value: String, reason: &'static str },
}

// =============================================================================
// Oid
// =============================================================================

/// A full object id (40 hex digits for SHA-1, 64 for SHA-256).
///
/// Stored lowercase, so ordering and prefix lookups are case-blind. An id
/// of all zeros is the hook protocol's "no object" marker; use
/// [`Oid::parse_endpoint`] to turn it into `None` at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(String);

impl Oid {
    const LENGTHS: [usize; 2] = [40, 64];

    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        let reason = if !Self::LENGTHS.contains(&oid.len()) {
            Some("expected 40 or 64 hex digits")
        } else if !oid.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some("not hexadecimal")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(TypeError::InvalidOid { value: oid, reason }),
            None => Ok(Self(oid)),
        }
    }

    /// Parse one endpoint of a reference update; all zeros means absent.
    pub fn parse_endpoint(oid: &str) -> Result<Option<Self>, TypeError> {
        let oid = Self::new(oid)?;
        Ok((!oid.is_zero()).then_some(oid))
    }

    /// The SHA-1 sized "no object" marker.
    pub fn zero() -> Self {
        Self("0".repeat(Self::LENGTHS[0]))
    }

    pub fn is_zero(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    /// The first `len` digits, or the whole id when it is shorter.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// RefName
// =============================================================================

/// A reference name accepted by `git check-ref-format --allow-onelevel`.
///
/// # Example
///
/// ```
/// use pushmail::core::types::RefName;
///
/// let tag = RefName::new("refs/tags/v1.0").unwrap();
/// assert_eq!(tag.area(), Some(("tags", "v1.0")));
/// assert_eq!(RefName::new("HEAD").unwrap().area(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

/// Substrings git forbids anywhere in a ref name.
const FORBIDDEN: [&str; 12] = [
    "..", "@{", "//", " ", "~", "^", ":", "\\", "?", "*", "[", "\u{7f}",
];

impl RefName {
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        match Self::problem(&name) {
            Some(reason) => Err(TypeError::InvalidRefName { value: name, reason }),
            None => Ok(Self(name)),
        }
    }

    fn problem(name: &str) -> Option<&'static str> {
        if name.is_empty() {
            return Some("empty");
        }
        if name.starts_with('/') || name.ends_with('/') {
            return Some("leading or trailing '/'");
        }
        if name.ends_with('.') || name.ends_with(".lock") {
            return Some("ends with '.' or '.lock'");
        }
        if name.split('/').any(|part| part.starts_with('.')) {
            return Some("a component starts with '.'");
        }
        if name.chars().any(|c| c.is_ascii_control()) {
            return Some("control character");
        }
        FORBIDDEN
            .iter()
            .any(|bad| name.contains(bad))
            .then_some("forbidden character sequence")
    }

    /// Split `refs/<area>/<rest>` into `(area, rest)`.
    ///
    /// Names of any other shape (`HEAD`, `refs/stash`) have no area.
    pub fn area(&self) -> Option<(&str, &str)> {
        static AREA: OnceLock<Option<Regex>> = OnceLock::new();
        let re = AREA
            .get_or_init(|| Regex::new(r"^refs/(?P<area>[^/]+)/(?P<rest>.+)$").ok())
            .as_ref()?;
        let caps = re.captures(&self.0)?;
        Some((caps.name("area")?.as_str(), caps.name("rest")?.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ObjectType
// =============================================================================

/// The type of a Git object.
///
/// `None` stands for "no object": the endpoint of a reference that did not
/// exist before (or after) the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Commit,
    Tag,
    Tree,
    Blob,
    None,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Commit => "commit",
            ObjectType::Tag => "tag",
            ObjectType::Tree => "tree",
            ObjectType::Blob => "blob",
            ObjectType::None => "none",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

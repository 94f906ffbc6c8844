//! notify::template
//!
//! Message templates and their expansion.
//!
//! # Design
//!
//! Templates use `%(name)s`-style placeholders with optional `-` (left
//! align), `0` (zero pad) and width, e.g. `%(action)10s`, `%(rev_short)-9s`
//! or `%(num)02d`. Each message kind has a fixed field schema:
//!
//! - a placeholder naming a field outside the schema is a [`TemplateError`];
//! - an absent *optional* field drops the line that references it;
//! - an absent *required* field is a [`TemplateError`].
//!
//! Dropping is therefore limited to the fields declared optional below
//! (identity-derived headers and endpoint types).
//!
//! # Example
//!
//! ```
//! use pushmail::notify::template::{expand_line, Expanded, MessageKind, Values};
//!
//! let mut values = Values::new(MessageKind::RefChange);
//! values.set("action", "new");
//! values.set("rev_short", "abc1234");
//! values.set("text", "Fix the frobnicator");
//!
//! let line = expand_line("%(action)10s  %(rev_short)-9s %(text)s", &values).unwrap();
//! assert_eq!(line, Expanded::Line("       new  abc1234   Fix the frobnicator".to_string()));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::ui::output::{self, Verbosity};

/// Errors from template expansion.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template field '{field}' is not defined for {kind} messages")]
    UnknownField { field: String, kind: MessageKind },

    #[error("required template field '{field}' has no value")]
    MissingField { field: String },

    #[error("malformed template line '{line}': {reason}")]
    Malformed { line: String, reason: String },
}

/// The kind of message a template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// The notification describing one reference change
    RefChange,
    /// The notification describing one announced commit
    Revision,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::RefChange => f.write_str("reference change"),
            MessageKind::Revision => f.write_str("revision"),
        }
    }
}

/// A field a message kind may reference.
#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    optional: bool,
}

const fn required(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        optional: false,
    }
}

const fn optional(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        optional: true,
    }
}

// =============================================================================
// Field schemas
// =============================================================================

/// Fields provided by the run environment to every message.
const ENVIRONMENT_FIELDS: &[FieldSpec] = &[
    required("repo_shortname"),
    required("repo_path"),
    required("projectdesc"),
    required("administrator"),
    required("emailprefix"),
    required("pusher"),
    optional("pusher_email"),
    optional("fromaddr"),
    optional("sender"),
];

const REFCHANGE_FIELDS: &[FieldSpec] = &[
    required("change_type"),
    required("refname_type"),
    required("refname"),
    required("short_refname"),
    required("msgid"),
    required("recipients"),
    required("subject"),
    required("oldrev"),
    required("oldrev_short"),
    required("newrev"),
    required("newrev_short"),
    optional("oldrev_type"),
    optional("newrev_type"),
    optional("reply_to"),
    // Supplied per line by summary generation
    required("action"),
    required("rev_short"),
    required("text"),
    required("tot"),
];

const REVISION_FIELDS: &[FieldSpec] = &[
    required("rev"),
    required("rev_short"),
    required("change_type"),
    required("refname"),
    required("short_refname"),
    required("refname_type"),
    required("reply_to_msgid"),
    required("num"),
    required("tot"),
    required("recipients"),
    required("oneline"),
    optional("author"),
    optional("reply_to"),
];

impl MessageKind {
    fn lookup(&self, name: &str) -> Option<FieldSpec> {
        let specific = match self {
            MessageKind::RefChange => REFCHANGE_FIELDS,
            MessageKind::Revision => REVISION_FIELDS,
        };
        ENVIRONMENT_FIELDS
            .iter()
            .chain(specific)
            .find(|spec| spec.name == name)
            .copied()
    }
}

// =============================================================================
// Templates
// =============================================================================

pub const REF_CREATED_SUBJECT: &str =
    "%(emailprefix)s%(refname_type)s %(short_refname)s created (now %(newrev_short)s)";

pub const REF_UPDATED_SUBJECT: &str =
    "%(emailprefix)s%(refname_type)s %(short_refname)s updated (%(oldrev_short)s -> %(newrev_short)s)";

pub const REF_DELETED_SUBJECT: &str =
    "%(emailprefix)s%(refname_type)s %(short_refname)s deleted (was %(oldrev_short)s)";

pub const REFCHANGE_HEADER: &str = "\
To: %(recipients)s
Subject: %(subject)s
Content-Type: text/plain; charset=utf-8
Message-ID: %(msgid)s
From: %(fromaddr)s
Reply-To: %(reply_to)s
X-Git-Repo: %(repo_shortname)s
X-Git-Refname: %(refname)s
X-Git-Reftype: %(refname_type)s
X-Git-Oldrev: %(oldrev)s
X-Git-Newrev: %(newrev)s
Auto-Submitted: auto-generated
";

pub const REFCHANGE_INTRO: &str = "\
This is an automated email from the git hooks/post-receive script.

%(pusher)s pushed a change to %(refname_type)s %(short_refname)s
in repository %(repo_shortname)s.

";

pub const FOOTER: &str = "\n-- \nTo stop receiving notification emails like this one, please contact
%(administrator)s.
";

pub const REWIND_ONLY: &str = "\
This update removed existing revisions from the reference, leaving the
reference pointing at a previous point in the repository history.

 * -- * -- N   %(refname)s (%(newrev_short)s)
            \\
             O -- O -- O   (%(oldrev_short)s)

Any revisions marked \"omits\" are not gone; other references still
refer to them.  Any revisions marked \"discards\" are gone forever.
";

pub const NON_FF: &str = "\
This update added new revisions after undoing existing revisions.
That is to say, some revisions that were in the old version of the
%(refname_type)s are not in the new version.  This situation occurs
when a user --force pushes a change and generates a repository
containing something like this:

 * -- * -- B -- O -- O -- O   (%(oldrev_short)s)
            \\
             N -- N -- N   %(refname)s (%(newrev_short)s)

You should already have received notification emails for all of the O
revisions, and so the following emails describe only the N revisions
from the common base, B.

Any revisions marked \"omits\" are not gone; other references still
refer to them.  Any revisions marked \"discards\" are gone forever.
";

pub const NO_NEW_REVISIONS: &str = "\
No new revisions were added by this update.
";

pub const DISCARDED_REVISIONS: &str = "\
This change permanently discards the following revisions:
";

pub const NO_DISCARDED_REVISIONS: &str = "\
The revisions that were on this %(refname_type)s are still contained in
other references; therefore, this change does not discard any commits
from the repository.
";

pub const NEW_REVISIONS: &str = "\
The %(tot)s revisions listed above as \"new\" are entirely new to this
repository and will be described in separate emails.  The revisions
listed as \"adds\" were already present in the repository and have only
been added to this reference.

";

pub const INCLUDES_NEW_COMMITS: &str =
    "This %(refname_type)s includes the following new commits:";

pub const TAG_CREATED: &str = "        at  %(newrev_short)-9s (%(newrev_type)s)\n";

pub const TAG_UPDATED: &str = "\
*** WARNING: tag %(short_refname)s was modified! ***

      from  %(oldrev_short)-9s (%(oldrev_type)s)
        to  %(newrev_short)-9s (%(newrev_type)s)
";

pub const TAG_DELETED: &str = "\
*** WARNING: tag %(short_refname)s was deleted! ***

";

pub const TAG_WAS: &str = "   tag was  %(oldrev_short)s";

/// One line of a commit listing; aligned with the tag templates.
pub const BRIEF_SUMMARY: &str = "%(action)10s  %(rev_short)-9s %(text)s";

pub const NON_COMMIT_UPDATE: &str = "\
This is an unusual reference change because the reference did not
refer to a commit either before or after the change.  We do not know
how to provide full information about this reference change.
";

pub const REVISION_HEADER: &str = "\
To: %(recipients)s
Subject: %(emailprefix)s%(num)02d/%(tot)02d: %(oneline)s
Content-Type: text/plain; charset=utf-8
From: %(fromaddr)s
Reply-To: %(reply_to)s
In-Reply-To: %(reply_to_msgid)s
X-Git-Repo: %(repo_shortname)s
X-Git-Refname: %(refname)s
X-Git-Reftype: %(refname_type)s
X-Git-Rev: %(rev)s
Auto-Submitted: auto-generated
";

pub const REVISION_INTRO: &str = "\
This is an automated email from the git hooks/post-receive script.

%(pusher)s pushed a commit to %(refname_type)s %(short_refname)s
in repository %(repo_shortname)s.

";

pub const LOGBEGIN: &str =
    "- Log -----------------------------------------------------------------";
pub const LOGEND: &str =
    "-----------------------------------------------------------------------";

// =============================================================================
// Values
// =============================================================================

/// Field values available to the templates of one message.
#[derive(Debug, Clone)]
pub struct Values {
    kind: MessageKind,
    fields: BTreeMap<&'static str, String>,
}

impl Values {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// Set a field.
    pub fn set(&mut self, name: &'static str, value: impl Into<String>) {
        self.fields.insert(name, value.into());
    }

    /// Set a field when a value is present.
    pub fn set_opt(&mut self, name: &'static str, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.set(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// A copy with extra per-line fields set.
    pub fn with(&self, extra: &[(&'static str, &str)]) -> Self {
        let mut values = self.clone();
        for (name, value) in extra {
            values.set(name, *value);
        }
        values
    }
}

// =============================================================================
// Expansion
// =============================================================================

/// Result of expanding one template line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expanded {
    Line(String),
    /// The line referenced an optional field that has no value
    Dropped { field: &'static str },
}

/// A parsed `%(name)...` conversion.
struct Conversion<'a> {
    name: &'a str,
    left: bool,
    zero: bool,
    width: usize,
}

impl Conversion<'_> {
    fn render(&self, value: &str, out: &mut String) {
        let len = value.chars().count();
        let pad = self.width.saturating_sub(len);
        if self.left {
            out.push_str(value);
            out.extend(std::iter::repeat(' ').take(pad));
        } else {
            let fill = if self.zero { '0' } else { ' ' };
            out.extend(std::iter::repeat(fill).take(pad));
            out.push_str(value);
        }
    }
}

/// Parse the conversion starting right after `%(`.
fn parse_conversion<'a>(line: &str, rest: &'a str) -> Result<(Conversion<'a>, &'a str), TemplateError> {
    let malformed = |reason: &str| TemplateError::Malformed {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let close = rest.find(')').ok_or_else(|| malformed("unterminated field name"))?;
    let name = &rest[..close];
    let mut spec = &rest[close + 1..];

    let mut left = false;
    let mut zero = false;
    loop {
        if let Some(tail) = spec.strip_prefix('-') {
            left = true;
            spec = tail;
        } else if let Some(tail) = spec.strip_prefix('0') {
            zero = true;
            spec = tail;
        } else {
            break;
        }
    }

    let digits = spec.len() - spec.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let width = if digits == 0 {
        0
    } else {
        spec[..digits]
            .parse()
            .map_err(|_| malformed("field width out of range"))?
    };
    spec = &spec[digits..];

    let tail = spec
        .strip_prefix('s')
        .or_else(|| spec.strip_prefix('d'))
        .ok_or_else(|| malformed("expected conversion 's' or 'd'"))?;

    Ok((
        Conversion {
            name,
            left,
            zero,
            width,
        },
        tail,
    ))
}

/// Expand one template line.
pub fn expand_line(line: &str, values: &Values) -> Result<Expanded, TemplateError> {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('%') {
            out.push('%');
            rest = tail;
            continue;
        }
        let Some(named) = after.strip_prefix('(') else {
            return Err(TemplateError::Malformed {
                line: line.to_string(),
                reason: "'%' must be followed by '(' or '%'".to_string(),
            });
        };

        let (conversion, tail) = parse_conversion(line, named)?;
        let spec = values
            .kind
            .lookup(conversion.name)
            .ok_or_else(|| TemplateError::UnknownField {
                field: conversion.name.to_string(),
                kind: values.kind,
            })?;

        match values.get(spec.name) {
            Some(value) => conversion.render(value, &mut out),
            None if spec.optional => return Ok(Expanded::Dropped { field: spec.name }),
            None => {
                return Err(TemplateError::MissingField {
                    field: spec.name.to_string(),
                })
            }
        }
        rest = tail;
    }

    out.push_str(rest);
    Ok(Expanded::Line(out))
}

/// Expand a multi-line template, dropping lines whose optional fields are
/// absent.
pub fn expand_lines(
    template: &str,
    values: &Values,
    verbosity: Verbosity,
) -> Result<Vec<String>, TemplateError> {
    let mut lines = Vec::new();
    for line in template.lines() {
        match expand_line(line, values)? {
            Expanded::Line(expanded) => lines.push(expanded),
            Expanded::Dropped { field } => output::debug(
                format!("no value for '{}'; line skipped: {}", field, line),
                verbosity,
            ),
        }
    }
    Ok(lines)
}

/// Expand a single-line template that must not be dropped.
pub fn expand_one(template: &str, values: &Values) -> Result<String, TemplateError> {
    match expand_line(template, values)? {
        Expanded::Line(line) => Ok(line),
        Expanded::Dropped { field } => Err(TemplateError::MissingField {
            field: field.to_string(),
        }),
    }
}

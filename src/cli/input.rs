//! cli::input
//!
//! Reading reference updates from the hook protocols.

use std::io::BufRead;

use crate::core::types::{Oid, RefName};
use crate::git::Oracle;
use crate::push::{PushError, RawUpdate};

/// Read post-receive input: one `<old> <new> <refname>` per line.
///
/// Blank lines are ignored.
pub fn read_batch(reader: impl BufRead) -> Result<Vec<RawUpdate>, PushError> {
    let mut updates = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| PushError::MalformedUpdate {
            line: String::new(),
            reason: e.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        updates.push(RawUpdate::parse(&line)?);
    }
    Ok(updates)
}

/// Build an update from the single-mode positionals.
///
/// Each revision is either an id (the zero id meaning absent) or an
/// expression resolved through the oracle.
pub fn resolve_single(
    oracle: &dyn Oracle,
    refname: &str,
    old: &str,
    new: &str,
) -> Result<RawUpdate, PushError> {
    let refname = RefName::new(refname).map_err(|e| PushError::MalformedUpdate {
        line: format!("{refname} {old} {new}"),
        reason: e.to_string(),
    })?;

    Ok(RawUpdate {
        old: resolve_endpoint(oracle, old)?,
        new: resolve_endpoint(oracle, new)?,
        refname,
    })
}

fn resolve_endpoint(oracle: &dyn Oracle, rev: &str) -> Result<Option<Oid>, PushError> {
    match Oid::parse_endpoint(rev) {
        Ok(endpoint) => Ok(endpoint),
        Err(_) => Ok(Some(oracle.resolve_revision(rev)?)),
    }
}

//! ui::output
//!
//! Diagnostic output for hook runs.
//!
//! # Design
//!
//! Everything here writes to stderr. A hook's stderr is relayed to the
//! pushing user by git, while stdout carries message text when the stdout
//! mailer is selected. `--quiet` leaves only errors; `--debug` adds
//! `[debug]` lines.

use std::fmt::Display;

/// How much the run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    /// Progress and warnings
    Normal,
    /// Everything, including dropped template lines and accounting sizes
    Debug,
}

impl Verbosity {
    /// `--quiet` wins over `--debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        match (quiet, debug) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Debug,
            (false, false) => Verbosity::Normal,
        }
    }
}

fn emit(threshold: Verbosity, verbosity: Verbosity, prefix: &str, message: impl Display) {
    if verbosity >= threshold {
        eprintln!("{}{}", prefix, message);
    }
}

/// Progress line, e.g. who a notification is going to.
pub fn info(message: impl Display, verbosity: Verbosity) {
    emit(Verbosity::Normal, verbosity, "", message);
}

pub fn debug(message: impl Display, verbosity: Verbosity) {
    emit(Verbosity::Debug, verbosity, "[debug] ", message);
}

pub fn warn(message: impl Display, verbosity: Verbosity) {
    emit(Verbosity::Normal, verbosity, "warning: ", message);
}

/// Always shown.
pub fn error(message: impl Display) {
    emit(Verbosity::Quiet, Verbosity::Quiet, "error: ", message);
}

/// One item per line, each behind `prefix`.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

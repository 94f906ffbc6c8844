//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Input Modes
//!
//! - batch (no positionals): `<old> <new> <refname>` lines on stdin, the
//!   post-receive hook protocol
//! - single: `pushmail REFNAME OLDREV NEWREV`, the update hook protocol;
//!   the revisions may be any expression the repository can resolve

use clap::Parser;
use std::path::PathBuf;

/// Pushmail - notification emails for pushes to a git repository
#[derive(Parser, Debug)]
#[command(name = "pushmail")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
EXAMPLES:
    # As a post-receive hook
    pushmail < updates

    # Preview the messages for one reference change
    pushmail --stdout refs/heads/main HEAD~3 HEAD

    # Send everything to one address, ignoring configured lists
    pushmail --recipients dev@example.com")]
pub struct Cli {
    /// Run as if pushmail was started in this directory
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Only report errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Print messages to stdout instead of sending them
    #[arg(long)]
    pub stdout: bool,

    /// Send every notification to these addresses (comma separated)
    #[arg(long, value_name = "ADDRESSES")]
    pub recipients: Option<String>,

    /// Name of the user who pushed (default: the login name)
    #[arg(long, value_name = "NAME")]
    pub pusher: Option<String>,

    /// One change to report instead of reading stdin
    #[arg(value_names = ["REFNAME", "OLDREV", "NEWREV"], num_args = 3)]
    pub update: Option<Vec<String>>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// `(refname, oldrev, newrev)` when running in single mode.
    pub fn single_update(&self) -> Option<(&str, &str, &str)> {
        match self.update.as_deref() {
            Some([refname, old, new]) => Some((refname.as_str(), old.as_str(), new.as_str())),
            _ => None,
        }
    }
}

//! Pushmail - notification emails for pushes to a git repository
//!
//! Pushmail runs as a post-receive (or update) hook. For every reference
//! changed by a push it sends one summary message, and for every commit the
//! push made new to the repository it sends exactly one revision message,
//! attributed to the first change (in processing order) that introduced it.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, wires the run)
//! - [`core`] - Domain types, configuration and the per-run environment
//! - [`git`] - Single interface for all repository queries
//! - [`push`] - Classification, commit accounting and dispatch
//! - [`notify`] - Message templates, composition, filtering and delivery
//! - [`ui`] - Diagnostics
//!
//! # Correctness Invariants
//!
//! 1. A commit new to the repository is announced at most once per push
//! 2. Notifications go out in a deterministic order
//! 3. Nothing a push did not touch is ever reported as new
//! 4. A commit left unannounced is reported as an error, never silently lost

pub mod cli;
pub mod core;
pub mod git;
pub mod notify;
pub mod push;
pub mod ui;

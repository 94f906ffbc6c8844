//! ui
//!
//! User-facing diagnostics.
//!
//! # Modules
//!
//! - [`output`] - Verbosity levels and stderr reporting
//!
//! # Design
//!
//! All progress, warnings and errors go through this module so the quiet
//! and debug flags apply uniformly.

pub mod output;

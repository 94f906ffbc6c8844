//! core
//!
//! Core domain types, configuration and the per-run context for pushmail.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Oid, RefName, ObjectType
//! - [`config`] - Configuration schema and loading
//! - [`environment`] - The context object built once per run
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - No process-global state; everything a run needs lives in [`environment::Environment`]

pub mod config;
pub mod environment;
pub mod types;

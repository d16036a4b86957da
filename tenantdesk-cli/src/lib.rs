//! # TenantDesk Console Library
//!
//! The command-line admin console: argument definitions, the shared console
//! context, and one handler per command.
//!
//! ## Modules
//!
//! - `app`: Console context (backend, auth, store, config) and permission checks
//! - `cli`: Command-line arguments
//! - `commands`: Command handlers
//! - `demo`: Seeded in-memory backend for `--offline`
//! - `error`: Error handling and exit codes
//! - `output`: Text tables and JSON output

pub mod app;
pub mod cli;
pub mod commands;
pub mod demo;
pub mod error;
pub mod output;

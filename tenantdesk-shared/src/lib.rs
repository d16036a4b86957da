//! # TenantDesk Shared Library
//!
//! This crate contains the data-access layer of the TenantDesk admin console:
//! typed shims over the hosted backend's remote procedures and tables, plus
//! the session, store, and formatting helpers the console and worker share.
//!
//! ## Module Organization
//!
//! - `backend`: The backend contract, its REST client, and an in-memory mock
//! - `models`: Entities and one function per remote call
//! - `auth`: Sign-in flows, token validation, and permission checks
//! - `store`: Cached console state
//! - `filters`: Local list search and selection
//! - `format`: Currency and date display
//! - `config`: Configuration management
//! - `error`: Common error types

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod filters;
pub mod format;
pub mod models;
pub mod store;

/// Current version of the TenantDesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}

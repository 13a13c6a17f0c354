//! DBA shell library
//!
//! Dialect-aware catalog and data queries for Oracle, MySQL and SQLite: a
//! per-dialect template registry, a parameter binder, result normalization,
//! and the interactive session and command layer built on them.

pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod models;
pub mod tools;

pub use config::Config;
pub use credentials::{AliasTarget, CredentialStore, Credentials};
pub use error::{DbError, DbResult};
pub use tools::Session;

//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Placeholder scanning and the per-dialect template registry
//! - Parameter binding of operation requests into executable queries
//! - Connections and transactions over sqlx (MySQL, SQLite) and `oracle`
//! - Row decoding and result normalization

pub mod binder;
pub mod connection;
pub mod normalize;
#[cfg(feature = "oracle")]
pub mod oracle;
pub mod placeholders;
pub mod statement;
pub mod templates;
pub mod types;

pub use binder::{AggregateSpec, Arg, Args, GroupedCount, NameMatch, Request, bind, bind_raw, prepare};
pub use connection::{DbConnection, DbTransaction};
pub use normalize::normalize;
pub use placeholders::SqlText;
pub use templates::{QueryTemplate, TemplateLibrary};

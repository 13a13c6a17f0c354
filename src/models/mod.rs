//! Data models for the DBA shell.
//!
//! This module re-exports all model types used throughout the application.

pub mod dialect;
pub mod operation;
pub mod query;
pub mod table;

// Re-export commonly used types
pub use dialect::Dialect;
pub use operation::Operation;
pub use query::{BoundQuery, QueryOutcome, QueryParam, StatementKind};
pub use table::{Column, ResultTable, Value};

//! Shell tooling.
//!
//! This module contains the interactive layer on top of the database core:
//! - `session`: default connection, open transaction and bind variables
//! - `commands`: command grammar and dispatch
//! - `format`: table, markdown and JSON rendering
//! - `repl`: line editor loop and piped input

pub mod commands;
pub mod format;
pub mod repl;
pub mod session;

pub use commands::{Control, ShellCommand, execute, parse_line};
pub use format::{OutputFormat, render, render_outcome};
pub use session::Session;

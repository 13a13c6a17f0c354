//! DBA shell - Main entry point.
//!
//! Connects to an alias from the alias file and either runs one command given
//! on the command line or starts the interactive shell.

use dba_shell::config::Config;
use dba_shell::credentials::{AliasTarget, CredentialStore};
use dba_shell::db::TemplateLibrary;
use dba_shell::error::{DbError, DbResult};
use dba_shell::tools::format::render;
use dba_shell::tools::{Session, repl};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so result output on stdout stays clean.
fn init_tracing(config: &Config) {
    if !config.enable_logs {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Rebuild a command line from argv words for the shell parser.
///
/// `sql` and `explain` take their statement verbatim, so words are joined
/// without quoting.
fn join_command(words: &[String]) -> String {
    if matches!(words.first().map(String::as_str), Some("sql" | "explain")) {
        return words.join(" ");
    }
    words
        .iter()
        .map(|word| {
            if word.is_empty() || word.contains(char::is_whitespace) || word.contains(['\'', '"']) {
                if word.contains('"') {
                    format!("'{word}'")
                } else {
                    format!("\"{word}\"")
                }
            } else {
                word.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn run(config: Config) -> DbResult<()> {
    let alias_file = config.alias_file()?;
    let store = CredentialStore::load(&alias_file)?;

    let Some(alias) = config.alias.as_deref() else {
        // Listing aliases needs no connection
        if config.command.first().map(String::as_str) == Some("aliases") {
            let filter = config.command.get(1).map(String::as_str);
            print!("{}", render(&store.aliases(filter)?, config.format, Duration::ZERO));
            return Ok(());
        }
        return Err(DbError::config(
            "no alias given; pass --alias ALIAS[.schema] or set DBA_SHELL_ALIAS",
        ));
    };
    let target: AliasTarget = alias.parse()?;

    let library = Arc::new(TemplateLibrary::builtin()?);
    info!(templates = library.len(), alias = %target, "Starting dba-shell v{}", env!("CARGO_PKG_VERSION"));

    let mut session = Session::open(store, library, config.pool_options()?, &target).await?;

    let result = if config.is_one_shot() {
        repl::run_once(&mut session, &join_command(&config.command), config.format).await
    } else {
        repl::run(&mut session, config.format).await
    };

    session.close().await;
    result
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(DbError::Usage { text }) => {
            eprintln!("{text}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "dba-shell failed");
            eprintln!("Error: {e}");
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {suggestion}");
            }
            ExitCode::FAILURE
        }
    }
}

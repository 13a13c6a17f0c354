//! Read-eval-print loop.
//!
//! A terminal gets a line editor with persistent history; piped input is read
//! line by line so scripts can drive the shell.

use crate::error::{DbError, DbResult};
use crate::tools::commands::{Control, execute, parse_line};
use crate::tools::format::OutputFormat;
use crate::tools::session::Session;
use reedline::{
    FileBackedHistory, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus,
    Reedline, Signal,
};
use std::borrow::Cow;
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use tracing::warn;

const HISTORY_FILE: &str = ".dba_shell_history";
const HISTORY_SIZE: usize = 1000;

struct ShellPrompt(String);

impl Prompt for ShellPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.0)
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!("({}reverse-search: {}) ", prefix, history_search.term))
    }
}

/// Ask on the terminal for a bind variable value.
fn ask_value(name: &str) -> Option<String> {
    print!("Please enter value for {name}: ");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

fn print_error(err: &DbError) {
    match err {
        DbError::Usage { text } => eprintln!("{text}"),
        other => {
            eprintln!("Error: {other}");
            if let Some(suggestion) = other.suggestion() {
                eprintln!("Hint: {suggestion}");
            }
        }
    }
}

/// Run one line. Returns false when the shell should stop.
///
/// Errors are printed and do not end the session.
pub async fn handle_line(session: &mut Session, line: &str, format: OutputFormat) -> bool {
    let command = match parse_line(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(e) => {
            print_error(&e);
            return true;
        }
    };
    match execute(session, command, format, ask_value).await {
        Ok(Control::Continue(output)) => {
            print!("{output}");
            true
        }
        Ok(Control::Quit) => false,
        Err(e) => {
            print_error(&e);
            true
        }
    }
}

/// Run a single command; returns an error so the process can exit non-zero.
pub async fn run_once(session: &mut Session, line: &str, format: OutputFormat) -> DbResult<()> {
    let Some(command) = parse_line(line)? else {
        return Ok(());
    };
    if let Control::Continue(output) = execute(session, command, format, ask_value).await? {
        print!("{output}");
    }
    Ok(())
}

fn history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE))
}

/// Read commands until `quit` or end of input.
pub async fn run(session: &mut Session, format: OutputFormat) -> DbResult<()> {
    if !std::io::stdin().is_terminal() {
        return run_piped(session, format).await;
    }

    let editor = Reedline::create();
    let mut editor = match history_path().map(|p| FileBackedHistory::with_file(HISTORY_SIZE, p)) {
        Some(Ok(history)) => editor.with_history(Box::new(history)),
        Some(Err(e)) => {
            warn!(error = %e, "History disabled");
            editor
        }
        None => editor,
    };

    loop {
        let prompt = ShellPrompt(session.prompt());
        match editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                if !handle_line(session, &line, format).await {
                    break;
                }
            }
            Ok(Signal::CtrlD) => break,
            Ok(_) => continue,
            Err(e) => return Err(DbError::internal(format!("line editor failed: {e}"))),
        }
    }
    Ok(())
}

async fn run_piped(session: &mut Session, format: OutputFormat) -> DbResult<()> {
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| DbError::internal(format!("reading input failed: {e}")))?;
        if read == 0 || !handle_line(session, &line, format).await {
            break;
        }
    }
    Ok(())
}

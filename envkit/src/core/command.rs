//! Resolved shell commands and batch outcome bookkeeping.
//!
//! A resolved command may carry a leading `"- "` marker meaning "continue on
//! error for this command only". The marker is never part of the executed
//! command line.

/// Prefix marking a command whose failure must not stop the batch.
pub const CONTINUE_ON_ERROR_MARKER: &str = "- ";

/// A resolved command with its marker stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCommand<'a> {
    /// Literal command line handed to the environment.
    pub command: &'a str,
    /// Logical OR of the batch-wide `force_continue` and the marker.
    pub continue_on_error: bool,
}

impl<'a> ResolvedCommand<'a> {
    pub fn parse(raw: &'a str, force_continue: bool) -> Self {
        match raw.strip_prefix(CONTINUE_ON_ERROR_MARKER) {
            Some(command) => Self {
                command,
                continue_on_error: true,
            },
            None => Self {
                command: raw,
                continue_on_error: force_continue,
            },
        }
    }
}

/// Commands are echoed when verbose or when the batch has several entries.
pub fn should_display_commands(verbose: bool, count: usize) -> bool {
    verbose || count > 1
}

/// Echo line shown before a command runs (`index` is 1-based).
pub fn command_label(source: &str, index: usize, command: &str) -> String {
    format!("{source} [{index}] | {command}")
}

/// Batch-level bookkeeping across a sequence of commands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOutcome {
    first_error_code: Option<i32>,
}

impl ExecutionOutcome {
    /// Record a non-zero exit. Only the first one is kept.
    pub fn record_failure(&mut self, code: i32) {
        self.first_error_code.get_or_insert(code);
    }

    pub fn first_error_code(&self) -> Option<i32> {
        self.first_error_code
    }
}

/// Decision taken after a single command exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Move on to the next command.
    Next,
    /// Stop the batch with this exit code and optional message.
    Stop { code: i32, message: Option<String> },
}

/// Apply the per-command error policy to an exit code.
pub fn judge_exit(
    command: &ResolvedCommand<'_>,
    exit_code: i32,
    show_code_on_error: bool,
    outcome: &mut ExecutionOutcome,
) -> Verdict {
    if exit_code == 0 {
        return Verdict::Next;
    }
    outcome.record_failure(exit_code);
    if command.continue_on_error {
        return Verdict::Next;
    }
    let message = show_code_on_error.then(|| format!("Failed with exit code: {exit_code}"));
    Verdict::Stop {
        code: exit_code,
        message,
    }
}

/// Exit code a forced-continue batch reports once every command has run.
pub fn final_exit_code(outcome: &ExecutionOutcome, force_continue: bool) -> Option<i32> {
    if force_continue {
        outcome.first_error_code()
    } else {
        None
    }
}

//! Running command batches inside an environment.

use tracing::{debug, info, instrument, warn};

use crate::app::Application;
use crate::core::command::{
    ExecutionOutcome, ResolvedCommand, Verdict, command_label, final_exit_code, judge_exit,
    should_display_commands,
};
use crate::error::Failure;
use crate::io::environment::{Environment, command_context};

/// Per-batch error policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Run every command even when some fail; the batch still fails at the end.
    pub force_continue: bool,
    /// Include `Failed with exit code: N` when a command stops the batch.
    pub show_code_on_error: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            force_continue: false,
            show_code_on_error: true,
        }
    }
}

/// Resolve and run `commands` in `env`, tagging echoed commands with `source`.
///
/// Resolution happens up front; a resolution failure means no command runs.
#[instrument(skip_all, fields(env = env.name(), source, count = commands.len()))]
pub fn run_shell_commands(
    app: &Application,
    env: &dyn Environment,
    commands: &[String],
    source: &str,
    options: RunOptions,
) -> Result<(), Failure> {
    let _context = command_context(env)?;
    let resolved = env
        .resolve_commands(commands)
        .map_err(|err| Failure::CommandResolution(format!("{err:#}")))?;

    let mut outcome = ExecutionOutcome::default();
    let display = should_display_commands(app.terminal().is_verbose(), resolved.len());
    for (index, raw) in resolved.iter().enumerate() {
        if display {
            app.terminal().display(&command_label(source, index + 1, raw));
        }

        let command = ResolvedCommand::parse(raw, options.force_continue);
        let exit_code = env.run_shell_command(command.command)?;
        debug!(command = command.command, exit_code, "command finished");

        match judge_exit(&command, exit_code, options.show_code_on_error, &mut outcome) {
            Verdict::Next => {}
            Verdict::Stop { code, message } => {
                warn!(command = command.command, code, "command failed, stopping batch");
                return Err(Failure::CommandExecution { code, message });
            }
        }
    }

    if let Some(code) = final_exit_code(&outcome, options.force_continue) {
        info!(code, "forced batch finished with failures");
        return Err(Failure::CommandExecution {
            code,
            message: None,
        });
    }
    Ok(())
}

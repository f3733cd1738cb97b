//! envkit command-line driver.
//!
//! Every failure travels back here as a [`Failure`]; this is the only place
//! that exits the process, after all guards have been dropped.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use envkit::app::Application;
use envkit::builder::{attach_builder, read_builder};
use envkit::commands::{RunOptions, run_shell_commands};
use envkit::core::capability::{Capability, DisplayStyle};
use envkit::error::Failure;
use envkit::exit_codes;
use envkit::io::config::{AppConfig, AppConfigBuilder, DEFAULT_ENV};
use envkit::io::environment::command_context;
use envkit::io::messenger::{Messenger, is_builder, procedure_from_cli};
use envkit::io::process::BuilderProcess;
use envkit::io::terminal::Terminal;
use envkit::logging;
use envkit::plugins::ensure_environment_plugin_dependencies;
use envkit::provision::prepare_environment;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "envkit",
    version,
    about = "Project environment manager with builder control channel"
)]
struct Cli {
    /// Increase verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Decrease verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    quiet: u8,
    /// Environment to operate on.
    #[arg(short, long, env = "ENVKIT_ENV", default_value = DEFAULT_ENV, global = true)]
    env: String,
    /// Project root containing `envkit.toml` (defaults to the current directory).
    #[arg(long, global = true)]
    project: Option<PathBuf>,
    #[arg(long, env = "ENVKIT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,
    #[arg(long, env = "ENVKIT_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn verbosity(&self) -> i32 {
        i32::from(self.verbose) - i32::from(self.quiet)
    }

    fn app_config(&self) -> Result<AppConfig> {
        let mut builder = AppConfigBuilder::new()
            .data_dir(self.data_dir.clone())
            .cache_dir(self.cache_dir.clone())
            .env_name(Some(self.env.clone()))
            .verbosity(self.verbosity());
        if let Some(project) = &self.project {
            builder = builder.project_root(project);
        }
        builder.build()
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision the selected environment.
    Create,
    /// Provision, then run shell commands inside the environment.
    Run {
        /// Run every command and fail with the first error code at the end.
        #[arg(long)]
        force_continue: bool,
        /// Do not show the exit code of a failed command.
        #[arg(long)]
        ignore_exit_code: bool,
        /// One shell command per argument.
        #[arg(last = true, required = true)]
        commands: Vec<String>,
    },
    /// Provision, then run a builder and honor its control-channel requests.
    Build {
        /// Collect the builder's text and print it once it exits.
        #[arg(long)]
        capture: bool,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Send a capability call to the parent envkit, or run it locally.
    #[command(allow_negative_numbers = true)]
    Emit {
        method: String,
        args: Vec<String>,
        /// Keyword argument as KEY=VALUE (repeatable).
        #[arg(long = "kwarg", value_name = "KEY=VALUE")]
        kwargs: Vec<String>,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let terminal = Terminal::stdio(cli.verbosity());

    let config = match cli.app_config() {
        Ok(config) => config,
        Err(err) => {
            let failure = Failure::from(err);
            if let Some(message) = failure.message() {
                terminal.display_error(&message);
            }
            std::process::exit(failure.exit_code());
        }
    };

    let code = {
        let app = Application::new(config, terminal);
        match run(&app, cli.command) {
            Ok(()) => exit_codes::OK,
            Err(failure) => app.report(&failure),
        }
    };
    std::process::exit(code);
}

fn run(app: &Application, command: Command) -> Result<(), Failure> {
    match command {
        Command::Create => cmd_create(app),
        Command::Run {
            force_continue,
            ignore_exit_code,
            commands,
        } => cmd_run(
            app,
            &commands,
            RunOptions {
                force_continue,
                show_code_on_error: !ignore_exit_code,
            },
        ),
        Command::Build { capture, command } => cmd_build(app, &shell_command(&command)?, capture),
        Command::Emit {
            method,
            args,
            kwargs,
        } => cmd_emit(app, &method, &args, &kwargs),
    }
}

/// Join argv words into one shell command line, quoting as needed.
fn shell_command(words: &[String]) -> Result<String> {
    shlex::try_join(words.iter().map(String::as_str)).context("quote builder command")
}

fn cmd_create(app: &Application) -> Result<(), Failure> {
    ensure_environment_plugin_dependencies(app)?;
    let env = app.get_environment(None)?;
    prepare_environment(app, env.as_ref())
}

fn cmd_run(app: &Application, commands: &[String], options: RunOptions) -> Result<(), Failure> {
    ensure_environment_plugin_dependencies(app)?;
    let env = app.get_environment(None)?;
    prepare_environment(app, env.as_ref())?;
    run_shell_commands(app, env.as_ref(), commands, "cmd", options)
}

fn cmd_build(app: &Application, command: &str, capture: bool) -> Result<(), Failure> {
    ensure_environment_plugin_dependencies(app)?;
    let env = app.get_environment(None)?;
    prepare_environment(app, env.as_ref())?;

    let _context = command_context(env.as_ref())?;
    let process = BuilderProcess::spawn(env.builder_command(command)?)?;
    if capture {
        let text = read_builder(process)?;
        app.terminal().display_styled(DisplayStyle::Plain, &text, "");
        Ok(())
    } else {
        attach_builder(app, process)
    }
}

fn cmd_emit(
    app: &Application,
    method: &str,
    args: &[String],
    kwargs: &[String],
) -> Result<(), Failure> {
    let procedure = procedure_from_cli(method, args, kwargs)?;
    let capability = Capability::from_procedure(&procedure)?;
    if is_builder() {
        debug!(method, "sending to parent");
        Messenger::stdout().send(&procedure)?;
        return Ok(());
    }
    app.safe_application().dispatch(capability)
}

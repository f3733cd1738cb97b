//! Making sure required plugin packages are installed.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::app::Application;
use crate::core::verbosity::add_verbosity_flag;
use crate::error::Failure;
use crate::io::process::{CommandRunner, SystemRunner};

/// Installer output is one notch quieter than envkit's own.
const INSTALLER_VERBOSITY_ADJUSTMENT: i32 = -1;

/// Decides whether a set of requirements is already satisfied.
pub trait DependencyCheck {
    fn dependencies_in_sync(&self, dependencies: &[String]) -> Result<bool>;
}

/// Presence check through `pip show`; versions are not evaluated.
pub struct PipShowCheck<'a, R> {
    pub python: &'a str,
    pub runner: &'a R,
}

impl<R: CommandRunner> DependencyCheck for PipShowCheck<'_, R> {
    fn dependencies_in_sync(&self, dependencies: &[String]) -> Result<bool> {
        for dependency in dependencies {
            let name = requirement_name(dependency);
            let argv = [self.python, "-m", "pip", "show", "-q", name].map(String::from);
            let code = self
                .runner
                .run(&argv)
                .with_context(|| format!("check plugin requirement {dependency}"))?;
            if code != 0 {
                debug!(dependency, "plugin requirement missing");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Distribution name of a requirement such as `foo[extra]>=1.0; python_version>"3"`.
pub fn requirement_name(requirement: &str) -> &str {
    let trimmed = requirement.trim_start();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

/// Installer invocation for `dependencies`.
pub fn installer_command(python: &str, verbosity: i32, dependencies: &[String]) -> Vec<String> {
    let mut command: Vec<String> = [
        python,
        "-u",
        "-m",
        "pip",
        "install",
        "--disable-pip-version-check",
        "--no-python-version-warning",
    ]
    .map(String::from)
    .to_vec();
    add_verbosity_flag(&mut command, verbosity, INSTALLER_VERBOSITY_ADJUSTMENT);
    command.extend(dependencies.iter().cloned());
    command
}

/// Install `dependencies` unless they are empty or already in sync.
#[instrument(skip_all, fields(count = dependencies.len()))]
pub fn ensure_plugin_dependencies<C: DependencyCheck, R: CommandRunner>(
    app: &Application,
    check: &C,
    runner: &R,
    dependencies: &[String],
    wait_message: &str,
) -> Result<(), Failure> {
    if dependencies.is_empty() {
        return Ok(());
    }
    if check.dependencies_in_sync(dependencies)? {
        debug!("plugin requirements satisfied");
        return Ok(());
    }

    let command = installer_command(&app.config().user.python, app.verbosity(), dependencies);
    info!(?command, "installing plugin requirements");
    let _status = app.terminal().status(wait_message);
    let code = runner.run(&command)?;
    if code != 0 {
        return Err(Failure::Installer {
            code,
            command: command.join(" "),
        });
    }
    Ok(())
}

/// Install the project's `[env] requires` list.
pub fn ensure_environment_plugin_dependencies(app: &Application) -> Result<(), Failure> {
    let runner = SystemRunner;
    let check = PipShowCheck {
        python: &app.config().user.python,
        runner: &runner,
    };
    ensure_plugin_dependencies(
        app,
        &check,
        &runner,
        &app.config().project.env.requires,
        "Syncing environment plugin requirements",
    )
}

//! Environment life cycle: create, install, then keep dependencies in sync.
//!
//! Keep [`prepare_environment`] easy to read; it documents the order in which
//! every environment type is driven.

use tracing::{info, instrument};

use crate::app::Application;
use crate::commands::{RunOptions, run_shell_commands};
use crate::error::Failure;
use crate::io::environment::Environment;

/// Bring `env` to a usable state.
///
/// Creation and installation only happen when the environment did not exist
/// at the start of the call. The dependency check always runs.
#[instrument(skip_all, fields(env = env.name()))]
pub fn prepare_environment(app: &Application, env: &dyn Environment) -> Result<(), Failure> {
    let terminal = app.terminal();

    if !env.exists() {
        {
            let _status = terminal.status(&format!("Creating environment: {}", env.name()));
            env.create()?;
        }
        info!("environment created");

        if !env.skip_install() {
            if !env.pre_install_commands().is_empty() {
                let _status = terminal.status("Running pre-installation commands");
                run_shell_commands(
                    app,
                    env,
                    env.pre_install_commands(),
                    "pre-install",
                    RunOptions::default(),
                )?;
            }

            if env.dev_mode() {
                let _status = terminal.status("Installing project in development mode");
                env.install_project_dev_mode()?;
            } else {
                let _status = terminal.status("Installing project");
                env.install_project()?;
            }

            if !env.post_install_commands().is_empty() {
                let _status = terminal.status("Running post-installation commands");
                run_shell_commands(
                    app,
                    env,
                    env.post_install_commands(),
                    "post-install",
                    RunOptions::default(),
                )?;
            }
        }
    }

    let in_sync = {
        let _status = terminal.status("Checking dependencies");
        env.dependencies_in_sync()?
    };

    if !in_sync {
        let _status = terminal.status("Syncing dependencies");
        env.sync_dependencies()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeEnvironment, TestApp, strings};

    #[test]
    fn new_dev_mode_env_in_sync() {
        let test = TestApp::new(0);
        let env = FakeEnvironment::new().dev_mode(true);
        prepare_environment(&test.app, &env).expect("prepare");
        assert_eq!(
            env.calls(),
            vec!["exists", "create", "install_project_dev_mode", "dependencies_in_sync"]
        );
        assert_eq!(
            test.err.contents(),
            "Creating environment: fake\nInstalling project in development mode\nChecking dependencies\n"
        );
    }

    #[test]
    fn existing_env_only_checks_dependencies() {
        let test = TestApp::new(0);
        let env = FakeEnvironment::new().existing().in_sync(false);
        prepare_environment(&test.app, &env).expect("prepare");
        assert_eq!(
            env.calls(),
            vec!["exists", "dependencies_in_sync", "sync_dependencies"]
        );
    }

    #[test]
    fn hooks_run_around_install() {
        let test = TestApp::new(0);
        let env = FakeEnvironment::new()
            .dev_mode(false)
            .pre_install(&["echo pre"])
            .post_install(&["echo post1", "echo post2"]);
        prepare_environment(&test.app, &env).expect("prepare");
        assert_eq!(
            env.calls(),
            vec![
                "exists",
                "create",
                "enter_command_context",
                "resolve_commands",
                "run: echo pre",
                "exit_command_context",
                "install_project",
                "enter_command_context",
                "resolve_commands",
                "run: echo post1",
                "run: echo post2",
                "exit_command_context",
                "dependencies_in_sync",
            ]
        );
        assert_eq!(
            test.out.contents(),
            "post-install [1] | echo post1\npost-install [2] | echo post2\n"
        );
    }

    #[test]
    fn skip_install_only_creates() {
        let test = TestApp::new(0);
        let env = FakeEnvironment::new()
            .skip_install(true)
            .pre_install(&["echo pre"]);
        prepare_environment(&test.app, &env).expect("prepare");
        assert_eq!(env.calls(), vec!["exists", "create", "dependencies_in_sync"]);
    }

    #[test]
    fn failing_pre_install_stops_provisioning() {
        let test = TestApp::new(0);
        let env = FakeEnvironment::new()
            .pre_install(&["exit 5"])
            .with_exit_code("exit 5", 5);
        let err = prepare_environment(&test.app, &env).unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(!env.calls().iter().any(|call| call.starts_with("install")));
        assert!(!env.calls().contains(&"dependencies_in_sync".to_string()));
        assert_eq!(env.executed(), strings(&["exit 5"]));
    }

    #[test]
    fn create_errors_propagate() {
        let test = TestApp::new(0);
        let env = FakeEnvironment::new().failing_create("no space left");
        let err = prepare_environment(&test.app, &env).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.message().expect("message").contains("no space left"));
    }
}

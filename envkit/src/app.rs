//! The application: resolved configuration, terminal and environment types.

use std::path::PathBuf;

use tracing::{debug, instrument};

use crate::error::Failure;
use crate::facade::SafeApplication;
use crate::io::config::{AppConfig, expand_home};
use crate::io::environment::{Environment, EnvironmentRegistry, EnvironmentSpec};
use crate::io::terminal::Terminal;

pub struct Application {
    config: AppConfig,
    terminal: Terminal,
    registry: EnvironmentRegistry,
}

impl Application {
    pub fn new(config: AppConfig, terminal: Terminal) -> Self {
        Self {
            config,
            terminal,
            registry: EnvironmentRegistry::builtin(),
        }
    }

    pub fn with_registry(mut self, registry: EnvironmentRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    pub fn verbosity(&self) -> i32 {
        self.terminal.verbosity()
    }

    /// The bounded surface handed to builders and environment plugins.
    pub fn safe_application(&self) -> SafeApplication<'_> {
        SafeApplication::new(self)
    }

    /// Construct the environment named `env_name`, or the selected one.
    #[instrument(skip(self))]
    pub fn get_environment(&self, env_name: Option<&str>) -> Result<Box<dyn Environment>, Failure> {
        let name = env_name.unwrap_or(&self.config.env_name);
        let config = self
            .config
            .project
            .envs
            .get(name)
            .ok_or_else(|| Failure::UnknownEnvironment(name.to_string()))?;
        let factory =
            self.registry
                .get(&config.env_type)
                .ok_or_else(|| Failure::UnknownEnvironmentType {
                    env: name.to_string(),
                    env_type: config.env_type.clone(),
                })?;
        let env_root = self.get_env_directory(&config.env_type);
        debug!(env_type = %config.env_type, env_root = %env_root.display(), "constructing environment");
        let environment = factory(EnvironmentSpec {
            name,
            config,
            project_root: &self.config.project_root,
            env_root,
            cache_root: self.config.cache_dir.join("env").join(&config.env_type),
            verbosity: self.verbosity(),
        })?;
        Ok(environment)
    }

    /// Storage root for environments of `env_type`.
    ///
    /// A configured directory wins (relative paths are taken from the project
    /// root); otherwise `<data_dir>/env/<env_type>`.
    pub fn get_env_directory(&self, env_type: &str) -> PathBuf {
        match self.config.user.dirs.env.get(env_type) {
            Some(configured) => {
                let path = expand_home(configured);
                if path.is_absolute() {
                    path
                } else {
                    self.config.project_root.join(path)
                }
            }
            None => self.config.data_dir.join("env").join(env_type),
        }
    }

    /// Show a failure's message, if any, and return the exit code to use.
    pub fn report(&self, failure: &Failure) -> i32 {
        if let Some(message) = failure.message() {
            self.terminal.display_error(&message);
        }
        failure.exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::{EnvConfig, UserConfig};
    use crate::test_support::{FakeEnvironment, TestApp};

    #[test]
    fn unknown_environment_is_reported() {
        let test = TestApp::new(0);
        let err = test.app.get_environment(Some("missing")).err().expect("error");
        assert!(matches!(err, Failure::UnknownEnvironment(ref name) if name == "missing"));
        assert_eq!(test.app.report(&err), 1);
        assert_eq!(test.err.contents(), "Unknown environment: missing\n");
    }

    #[test]
    fn unknown_environment_type_is_reported() {
        let test = TestApp::with_config(0, |config| {
            config.project.envs.insert(
                "box".to_string(),
                EnvConfig {
                    env_type: "container".to_string(),
                    ..EnvConfig::default()
                },
            );
        });
        let err = test.app.get_environment(Some("box")).err().expect("error");
        assert_eq!(
            err.message().as_deref(),
            Some("Environment `box` has unknown type: container")
        );
    }

    fn container_factory(spec: EnvironmentSpec<'_>) -> anyhow::Result<Box<dyn Environment>> {
        assert_eq!(spec.name, "box");
        assert!(spec.cache_root.ends_with("cache/env/container"));
        assert!(spec.env_root.ends_with("data/env/container"));
        Ok(Box::new(FakeEnvironment::new()))
    }

    #[test]
    fn registered_types_construct_environments() {
        let test = TestApp::with_config(2, |config| {
            config.project.envs.insert(
                "box".to_string(),
                EnvConfig {
                    env_type: "container".to_string(),
                    ..EnvConfig::default()
                },
            );
        });
        let mut registry = EnvironmentRegistry::builtin();
        registry.register("container", container_factory);
        let app = test.app.with_registry(registry);

        let env = app.get_environment(Some("box")).expect("env");
        assert_eq!(env.name(), "fake");
        assert!(app.get_environment(None).is_ok());
    }

    #[test]
    fn selected_environment_is_default() {
        let test = TestApp::new(0);
        let env = test.app.get_environment(None).expect("env");
        assert_eq!(env.name(), "default");
        assert!(!env.exists());
    }

    #[test]
    fn env_directory_defaults_under_data_dir() {
        let test = TestApp::new(0);
        let config = test.app.config();
        assert_eq!(
            test.app.get_env_directory("local"),
            config.data_dir.join("env").join("local")
        );
    }

    #[test]
    fn configured_env_directory_is_relative_to_project() {
        let test = TestApp::with_config(0, |config| {
            let mut user = UserConfig::default();
            user.dirs.env.insert("local".to_string(), PathBuf::from(".envs"));
            user.dirs.env.insert("abs".to_string(), PathBuf::from("/opt/envs"));
            config.user = user;
        });
        let root = test.app.config().project_root.clone();
        assert_eq!(test.app.get_env_directory("local"), root.join(".envs"));
        assert_eq!(test.app.get_env_directory("abs"), PathBuf::from("/opt/envs"));
    }

    #[test]
    fn silent_failures_print_nothing() {
        let test = TestApp::new(0);
        let code = test.app.report(&Failure::Exit {
            code: 9,
            message: None,
        });
        assert_eq!(code, 9);
        assert_eq!(test.err.contents(), "");
    }
}

//! Environment contract and the registry of environment types.
//!
//! The [`Environment`] trait decouples provisioning and command execution
//! from how an environment is realized. Tests use fakes that record calls
//! without touching the filesystem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use tracing::debug;

use crate::io::config::EnvConfig;
use crate::io::local_env::LocalEnvironment;

/// An isolated execution environment for a project.
pub trait Environment {
    fn name(&self) -> &str;
    fn exists(&self) -> bool;
    fn skip_install(&self) -> bool;
    fn dev_mode(&self) -> bool;
    fn pre_install_commands(&self) -> &[String];
    fn post_install_commands(&self) -> &[String];

    fn create(&self) -> Result<()>;
    fn install_project(&self) -> Result<()>;
    fn install_project_dev_mode(&self) -> Result<()>;
    fn dependencies_in_sync(&self) -> Result<bool>;
    fn sync_dependencies(&self) -> Result<()>;

    /// Expand command templates (scripts, placeholders) into literal commands.
    fn resolve_commands(&self, commands: &[String]) -> Result<Vec<String>>;
    /// Run one literal command and return its exit code.
    fn run_shell_command(&self, command: &str) -> Result<i32>;
    /// Prepare, but do not spawn, a builder process running `command`.
    fn builder_command(&self, command: &str) -> Result<Command>;

    /// Called when a batch of commands starts. Paired with [`Environment::exit_command_context`].
    fn enter_command_context(&self) -> Result<()> {
        Ok(())
    }

    fn exit_command_context(&self) {}
}

/// Scoped command context; exits the context on drop.
pub struct CommandContext<'a> {
    env: &'a dyn Environment,
}

/// Enter `env`'s command context for as long as the guard lives.
pub fn command_context(env: &dyn Environment) -> Result<CommandContext<'_>> {
    env.enter_command_context()?;
    debug!(env = env.name(), "entered command context");
    Ok(CommandContext { env })
}

impl Drop for CommandContext<'_> {
    fn drop(&mut self) {
        self.env.exit_command_context();
        debug!(env = self.env.name(), "exited command context");
    }
}

/// Everything an environment type needs to construct an environment.
#[derive(Debug, Clone)]
pub struct EnvironmentSpec<'a> {
    pub name: &'a str,
    pub config: &'a EnvConfig,
    pub project_root: &'a Path,
    /// Storage root for this environment type; environments live beneath it.
    pub env_root: PathBuf,
    /// Cache root for this environment type.
    pub cache_root: PathBuf,
    pub verbosity: i32,
}

pub type EnvironmentFactory = fn(EnvironmentSpec<'_>) -> Result<Box<dyn Environment>>;

/// Environment types known to this build.
pub struct EnvironmentRegistry {
    factories: BTreeMap<String, EnvironmentFactory>,
}

impl EnvironmentRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in `local` type.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(LocalEnvironment::TYPE, local_factory);
        registry
    }

    pub fn register(&mut self, env_type: &str, factory: EnvironmentFactory) {
        self.factories.insert(env_type.to_string(), factory);
    }

    pub fn get(&self, env_type: &str) -> Option<EnvironmentFactory> {
        self.factories.get(env_type).copied()
    }
}

fn local_factory(spec: EnvironmentSpec<'_>) -> Result<Box<dyn Environment>> {
    Ok(Box::new(LocalEnvironment::new(spec)))
}

impl Default for EnvironmentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeEnvironment;

    #[test]
    fn command_context_exits_on_drop() {
        let env = FakeEnvironment::new();
        {
            let _context = command_context(&env).expect("enter");
            assert_eq!(env.calls(), vec!["enter_command_context"]);
        }
        assert_eq!(
            env.calls(),
            vec!["enter_command_context", "exit_command_context"]
        );
    }

    #[test]
    fn builtin_registry_knows_local() {
        let registry = EnvironmentRegistry::builtin();
        assert!(registry.get("local").is_some());
        assert!(registry.get("docker").is_none());
    }
}

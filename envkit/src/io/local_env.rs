//! Built-in `local` environment type.
//!
//! A local environment is a directory under the environment-type root. Its
//! `bin/` is prepended to `PATH` for every command, commands run through the
//! platform shell from the project root, and the fingerprint of the last
//! synced dependency list is kept in a small JSON state file. Commands also
//! see the environment's cache directory and envkit's verbosity, so install
//! and sync commands can forward them to their own tools.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use crate::core::scripts::ScriptTable;
use crate::io::config::EnvConfig;
use crate::io::environment::{Environment, EnvironmentSpec};
use crate::io::messenger::BUILDER_ENV_VAR;
use crate::io::process::{run_shell, shell};

const STATE_FILE: &str = ".envkit-state.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct EnvState {
    dependency_fingerprint: Option<String>,
}

pub struct LocalEnvironment {
    name: String,
    project_root: PathBuf,
    directory: PathBuf,
    cache_directory: PathBuf,
    verbosity: i32,
    config: EnvConfig,
    scripts: ScriptTable,
    context_depth: Cell<u32>,
}

impl LocalEnvironment {
    pub const TYPE: &'static str = "local";

    pub fn new(spec: EnvironmentSpec<'_>) -> Self {
        let directory = spec.env_root.join(spec.name);
        let cache_directory = spec.cache_root.join(spec.name);
        let scripts = spec
            .config
            .scripts
            .iter()
            .map(|(name, script)| (name.clone(), script.commands()))
            .collect();
        let scripts = ScriptTable::new(scripts)
            .with_placeholder("root", spec.project_root.display().to_string())
            .with_placeholder("env_name", spec.name)
            .with_placeholder("env_dir", directory.display().to_string());
        Self {
            name: spec.name.to_string(),
            project_root: spec.project_root.to_path_buf(),
            directory,
            cache_directory,
            verbosity: spec.verbosity,
            config: spec.config.clone(),
            scripts,
            context_depth: Cell::new(0),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn state_path(&self) -> PathBuf {
        self.directory.join(STATE_FILE)
    }

    fn load_state(&self) -> Result<EnvState> {
        let path = self.state_path();
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
    }

    fn write_state(&self, state: &EnvState) -> Result<()> {
        let path = self.state_path();
        let mut payload = serde_json::to_string_pretty(state).context("serialize env state")?;
        payload.push('\n');
        fs::write(&path, payload).with_context(|| format!("write {}", path.display()))
    }

    fn env_vars(&self) -> Result<Vec<(String, String)>> {
        let bin = self.directory.join("bin");
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let path = std::env::join_paths(
            std::iter::once(bin).chain(std::env::split_paths(&inherited)),
        )
        .context("build PATH")?;
        let mut vars = vec![
            ("ENVKIT_ENV".to_string(), self.name.clone()),
            (
                "ENVKIT_ENV_DIR".to_string(),
                self.directory.display().to_string(),
            ),
            (
                "ENVKIT_PROJECT_ROOT".to_string(),
                self.project_root.display().to_string(),
            ),
            (
                "ENVKIT_ENV_CACHE_DIR".to_string(),
                self.cache_directory.display().to_string(),
            ),
            ("ENVKIT_VERBOSITY".to_string(), self.verbosity.to_string()),
            ("PATH".to_string(), path.to_string_lossy().into_owned()),
        ];
        if self.context_depth.get() > 0 {
            vars.push(("ENVKIT_ENV_ACTIVE".to_string(), self.name.clone()));
        }
        Ok(vars)
    }

    fn run_hook(&self, label: &str, command: Option<&str>) -> Result<()> {
        let Some(command) = command else {
            debug!(env = %self.name, label, "no command configured");
            return Ok(());
        };
        let code = self.run_shell_command(command)?;
        if code != 0 {
            bail!("{label} `{command}` failed with exit code {code}");
        }
        Ok(())
    }
}

fn fingerprint(dependencies: &[String]) -> String {
    let mut hasher = Sha256::new();
    for dependency in dependencies {
        hasher.update(dependency.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

impl Environment for LocalEnvironment {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self) -> bool {
        self.state_path().is_file()
    }

    fn skip_install(&self) -> bool {
        self.config.skip_install
    }

    fn dev_mode(&self) -> bool {
        self.config.dev_mode
    }

    fn pre_install_commands(&self) -> &[String] {
        &self.config.pre_install_commands
    }

    fn post_install_commands(&self) -> &[String] {
        &self.config.post_install_commands
    }

    #[instrument(skip_all, fields(env = %self.name))]
    fn create(&self) -> Result<()> {
        let bin = self.directory.join("bin");
        fs::create_dir_all(&bin).with_context(|| format!("create {}", bin.display()))?;
        fs::create_dir_all(&self.cache_directory)
            .with_context(|| format!("create {}", self.cache_directory.display()))?;
        self.write_state(&EnvState::default())?;
        info!(directory = %self.directory.display(), "created local environment");
        Ok(())
    }

    fn install_project(&self) -> Result<()> {
        self.run_hook("install command", self.config.install_command.as_deref())
    }

    fn install_project_dev_mode(&self) -> Result<()> {
        self.run_hook(
            "dev install command",
            self.config.dev_install_command.as_deref(),
        )
    }

    fn dependencies_in_sync(&self) -> Result<bool> {
        if self.config.dependencies.is_empty() {
            return Ok(true);
        }
        let state = self.load_state()?;
        Ok(state.dependency_fingerprint.as_deref()
            == Some(fingerprint(&self.config.dependencies).as_str()))
    }

    #[instrument(skip_all, fields(env = %self.name, count = self.config.dependencies.len()))]
    fn sync_dependencies(&self) -> Result<()> {
        let Some(sync_command) = self.config.sync_command.as_deref() else {
            bail!(
                "environment `{}` lists dependencies but has no sync-command",
                self.name
            );
        };
        let dependencies = shlex::try_join(self.config.dependencies.iter().map(String::as_str))
            .context("quote dependencies for sync-command")?;
        let command = format!("{sync_command} {dependencies}");
        self.run_hook("sync command", Some(&command))?;
        self.write_state(&EnvState {
            dependency_fingerprint: Some(fingerprint(&self.config.dependencies)),
        })
    }

    fn resolve_commands(&self, commands: &[String]) -> Result<Vec<String>> {
        Ok(self.scripts.resolve(commands)?)
    }

    fn run_shell_command(&self, command: &str) -> Result<i32> {
        run_shell(command, &self.project_root, &self.env_vars()?)
    }

    fn builder_command(&self, command: &str) -> Result<Command> {
        let mut cmd = shell(command);
        cmd.current_dir(&self.project_root)
            .envs(self.env_vars()?)
            .env(BUILDER_ENV_VAR, "1");
        Ok(cmd)
    }

    fn enter_command_context(&self) -> Result<()> {
        self.context_depth.set(self.context_depth.get() + 1);
        Ok(())
    }

    fn exit_command_context(&self) {
        self.context_depth
            .set(self.context_depth.get().saturating_sub(1));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::io::config::Script;
    use crate::io::environment::command_context;

    fn local(root: &Path, config: &EnvConfig) -> LocalEnvironment {
        LocalEnvironment::new(EnvironmentSpec {
            name: "default",
            config,
            project_root: root,
            env_root: root.join(".envs"),
            cache_root: root.join(".cache"),
            verbosity: 2,
        })
    }

    #[test]
    fn create_makes_environment_exist() {
        let temp = tempfile::tempdir().expect("tempdir");
        let env = local(temp.path(), &EnvConfig::default());
        assert!(!env.exists());
        env.create().expect("create");
        assert!(env.exists());
        assert!(env.directory().join("bin").is_dir());
        assert!(temp.path().join(".cache").join("default").is_dir());
    }

    #[test]
    fn dependency_changes_require_sync() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = EnvConfig {
            dependencies: vec!["a>=1".to_string()],
            sync_command: Some(format!("echo >> {}/synced.txt", temp.path().display())),
            ..EnvConfig::default()
        };
        let env = local(temp.path(), &config);
        env.create().expect("create");
        assert!(!env.dependencies_in_sync().expect("check"));
        env.sync_dependencies().expect("sync");
        assert!(env.dependencies_in_sync().expect("check"));
        let synced = fs::read_to_string(temp.path().join("synced.txt")).expect("read");
        assert_eq!(synced, "a>=1\n");

        config.dependencies.push("b".to_string());
        let env = local(temp.path(), &config);
        assert!(!env.dependencies_in_sync().expect("check"));
    }

    #[test]
    fn sync_without_command_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = EnvConfig {
            dependencies: vec!["a".to_string()],
            ..EnvConfig::default()
        };
        let env = local(temp.path(), &config);
        env.create().expect("create");
        let err = env.sync_dependencies().unwrap_err();
        assert!(err.to_string().contains("no sync-command"));
    }

    #[test]
    fn failing_install_command_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = EnvConfig {
            install_command: Some("exit 3".to_string()),
            ..EnvConfig::default()
        };
        let env = local(temp.path(), &config);
        let err = env.install_project().unwrap_err();
        assert!(err.to_string().contains("exit code 3"));
        // No dev install command configured: nothing to do.
        env.install_project_dev_mode().expect("dev install");
    }

    #[test]
    fn commands_see_environment_variables() {
        let temp = tempfile::tempdir().expect("tempdir");
        let env = local(temp.path(), &EnvConfig::default());
        assert_eq!(
            env.run_shell_command("test \"$ENVKIT_ENV\" = default")
                .expect("run"),
            0
        );
        assert_eq!(
            env.run_shell_command("test \"$ENVKIT_VERBOSITY\" = 2")
                .expect("run"),
            0
        );
        let cache_check = format!(
            "test \"$ENVKIT_ENV_CACHE_DIR\" = '{}'",
            temp.path().join(".cache").join("default").display()
        );
        assert_eq!(env.run_shell_command(&cache_check).expect("run"), 0);
        assert_ne!(
            env.run_shell_command("test -n \"$ENVKIT_ENV_ACTIVE\"")
                .expect("run"),
            0
        );
        let _context = command_context(&env).expect("enter");
        assert_eq!(
            env.run_shell_command("test \"$ENVKIT_ENV_ACTIVE\" = default")
                .expect("run"),
            0
        );
    }

    #[test]
    fn resolve_expands_scripts_and_placeholders() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = EnvConfig::default();
        config
            .scripts
            .insert("where".to_string(), Script::One("echo {env_name}".to_string()));
        let env = local(temp.path(), &config);
        let resolved = env
            .resolve_commands(&["where now".to_string()])
            .expect("resolve");
        assert_eq!(resolved, vec!["echo default now".to_string()]);
    }

    #[test]
    fn sync_quotes_each_dependency() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = EnvConfig {
            dependencies: vec!["it's".to_string(), "a b".to_string(), "c;d".to_string()],
            sync_command: Some(format!(
                "printf '%s|' >> {}/synced.txt",
                temp.path().display()
            )),
            ..EnvConfig::default()
        };
        let env = local(temp.path(), &config);
        env.create().expect("create");
        env.sync_dependencies().expect("sync");
        let synced = fs::read_to_string(temp.path().join("synced.txt")).expect("read");
        assert_eq!(synced, "it's|a b|c;d|");
    }

    #[test]
    fn nul_bytes_in_dependencies_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = EnvConfig {
            dependencies: vec!["bad\0dep".to_string()],
            sync_command: Some("true".to_string()),
            ..EnvConfig::default()
        };
        let env = local(temp.path(), &config);
        env.create().expect("create");
        let err = env.sync_dependencies().unwrap_err();
        assert!(format!("{err:#}").contains("quote dependencies"));
    }
}

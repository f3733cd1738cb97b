//! Project configuration (`envkit.toml`), user configuration and the
//! resolved [`AppConfig`].
//!
//! [`AppConfig`] is produced in one step by [`AppConfigBuilder::build`];
//! nothing downstream ever sees a partially-populated configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// File name of the project configuration, relative to the project root.
pub const PROJECT_CONFIG_FILE: &str = "envkit.toml";
/// Environment selected when none is given.
pub const DEFAULT_ENV: &str = "default";
/// Environment type used when an environment does not name one.
pub const DEFAULT_ENV_TYPE: &str = "local";

/// Project-level configuration (TOML).
///
/// Missing fields default to sensible values. A `default` environment always
/// exists, even when the file does not declare one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProjectConfig {
    /// Settings shared by every environment.
    pub env: SharedEnvConfig,
    pub envs: BTreeMap<String, EnvConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct SharedEnvConfig {
    /// Plugin packages required before any environment is used.
    pub requires: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct EnvConfig {
    #[serde(rename = "type")]
    pub env_type: String,
    pub skip_install: bool,
    pub dev_mode: bool,
    pub pre_install_commands: Vec<String>,
    pub post_install_commands: Vec<String>,
    pub dependencies: Vec<String>,
    /// Run by `install_project`.
    pub install_command: Option<String>,
    /// Run by `install_project_dev_mode`.
    pub dev_install_command: Option<String>,
    /// Run by `sync_dependencies` with every dependency appended.
    pub sync_command: Option<String>,
    pub scripts: BTreeMap<String, Script>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            env_type: DEFAULT_ENV_TYPE.to_string(),
            skip_install: false,
            dev_mode: true,
            pre_install_commands: Vec::new(),
            post_install_commands: Vec::new(),
            dependencies: Vec::new(),
            install_command: None,
            dev_install_command: None,
            sync_command: None,
            scripts: BTreeMap::new(),
        }
    }
}

/// A script is either one command or a list of commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Script {
    One(String),
    Many(Vec<String>),
}

impl Script {
    pub fn commands(&self) -> Vec<String> {
        match self {
            Self::One(command) => vec![command.clone()],
            Self::Many(commands) => commands.clone(),
        }
    }
}

impl ProjectConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, env) in &self.envs {
            if name.trim().is_empty() {
                return Err(anyhow!("environment names must be non-empty"));
            }
            if env.env_type.trim().is_empty() {
                return Err(anyhow!("envs.{name}.type must be non-empty"));
            }
            for (script, commands) in &env.scripts {
                if commands.commands().iter().all(|c| c.trim().is_empty()) {
                    return Err(anyhow!("envs.{name}.scripts.{script} has no commands"));
                }
            }
        }
        Ok(())
    }

    fn with_default_env(mut self) -> Self {
        self.envs.entry(DEFAULT_ENV.to_string()).or_default();
        self
    }
}

/// Load project config from a TOML file.
///
/// If the file is missing, returns a config holding only the `default` environment.
pub fn load_project_config(path: &Path) -> Result<ProjectConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no project config, using defaults");
        return Ok(ProjectConfig::default().with_default_env());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ProjectConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid {}", path.display()))?;
    Ok(cfg.with_default_env())
}

/// User-level configuration (TOML), shared by every project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserConfig {
    /// Interpreter used to run the plugin package installer.
    pub python: String,
    pub dirs: DirsConfig,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            dirs: DirsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DirsConfig {
    pub data: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    /// Per environment type storage; relative paths are taken from the project root.
    pub env: BTreeMap<String, PathBuf>,
}

impl UserConfig {
    pub fn validate(&self) -> Result<()> {
        if self.python.trim().is_empty() {
            return Err(anyhow!("python must be non-empty"));
        }
        Ok(())
    }
}

/// Default location of the user config, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("envkit").join("config.toml"))
}

/// Load user config from a TOML file.
///
/// If the file is missing, returns `UserConfig::default()`.
pub fn load_user_config(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: UserConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Replace a leading `~` with the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Fully resolved configuration for one envkit invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub project_root: PathBuf,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Environment selected for this invocation.
    pub env_name: String,
    pub verbosity: i32,
    pub project: ProjectConfig,
    pub user: UserConfig,
}

/// Collects invocation inputs, then resolves them into an [`AppConfig`].
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    project_root: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    env_name: Option<String>,
    verbosity: i32,
    user: Option<UserConfig>,
}

impl AppConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.data_dir = dir;
        self
    }

    pub fn cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache_dir = dir;
        self
    }

    pub fn env_name(mut self, name: Option<String>) -> Self {
        self.env_name = name;
        self
    }

    pub fn verbosity(mut self, verbosity: i32) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Use this user config instead of reading it from [`user_config_path`].
    pub fn user_config(mut self, user: UserConfig) -> Self {
        self.user = Some(user);
        self
    }

    pub fn build(self) -> Result<AppConfig> {
        let project_root = match self.project_root {
            Some(root) => root,
            None => std::env::current_dir().context("resolve current directory")?,
        };
        let user = match self.user {
            Some(user) => user,
            None => match user_config_path() {
                Some(path) => load_user_config(&path)?,
                None => UserConfig::default(),
            },
        };
        let project = load_project_config(&project_root.join(PROJECT_CONFIG_FILE))?;

        let data_dir = self
            .data_dir
            .or_else(|| user.dirs.data.as_deref().map(expand_home))
            .or_else(|| dirs::data_dir().map(|dir| dir.join("envkit")))
            .ok_or_else(|| anyhow!("no data directory available; pass --data-dir"))?;
        let cache_dir = self
            .cache_dir
            .or_else(|| user.dirs.cache.as_deref().map(expand_home))
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("envkit")))
            .ok_or_else(|| anyhow!("no cache directory available; pass --cache-dir"))?;

        Ok(AppConfig {
            project_root,
            data_dir,
            cache_dir,
            env_name: self.env_name.unwrap_or_else(|| DEFAULT_ENV.to_string()),
            verbosity: self.verbosity,
            project,
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default_env() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_project_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg.envs.len(), 1);
        assert_eq!(cfg.envs[DEFAULT_ENV], EnvConfig::default());
    }

    #[test]
    fn load_parses_kebab_case_fields_and_scripts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(PROJECT_CONFIG_FILE);
        fs::write(
            &path,
            r#"
[env]
requires = ["envkit-docker>=1"]

[envs.docs]
dev-mode = false
pre-install-commands = ["echo pre"]
dependencies = ["mkdocs"]

[envs.docs.scripts]
build = "mkdocs build {args}"
check = ["- linkcheck", "mkdocs build --strict"]
"#,
        )
        .expect("write");

        let cfg = load_project_config(&path).expect("load");
        assert_eq!(cfg.env.requires, vec!["envkit-docker>=1".to_string()]);
        let docs = &cfg.envs["docs"];
        assert_eq!(docs.env_type, DEFAULT_ENV_TYPE);
        assert!(!docs.dev_mode);
        assert_eq!(docs.pre_install_commands, vec!["echo pre".to_string()]);
        assert_eq!(docs.scripts["build"].commands(), vec!["mkdocs build {args}".to_string()]);
        assert_eq!(docs.scripts["check"].commands().len(), 2);
        assert!(cfg.envs.contains_key(DEFAULT_ENV));
    }

    #[test]
    fn invalid_type_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(PROJECT_CONFIG_FILE);
        fs::write(&path, "[envs.x]\ntype = \"\"\n").expect("write");
        let err = load_project_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("envs.x.type"));
    }

    #[test]
    fn builder_prefers_explicit_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = AppConfigBuilder::new()
            .project_root(temp.path())
            .data_dir(Some(temp.path().join("data")))
            .cache_dir(Some(temp.path().join("cache")))
            .user_config(UserConfig::default())
            .build()
            .expect("build");
        assert_eq!(cfg.data_dir, temp.path().join("data"));
        assert_eq!(cfg.cache_dir, temp.path().join("cache"));
        assert_eq!(cfg.env_name, DEFAULT_ENV);
    }

    #[test]
    fn builder_falls_back_to_user_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut user = UserConfig::default();
        user.dirs.data = Some(temp.path().join("user-data"));
        let cfg = AppConfigBuilder::new()
            .project_root(temp.path())
            .cache_dir(Some(temp.path().join("cache")))
            .env_name(Some("docs".to_string()))
            .user_config(user)
            .build()
            .expect("build");
        assert_eq!(cfg.data_dir, temp.path().join("user-data"));
        assert_eq!(cfg.env_name, "docs");
    }

    #[test]
    fn user_config_defaults_python() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[dirs.env]\nlocal = \".envs\"\n").expect("write");
        let cfg = load_user_config(&path).expect("load");
        assert_eq!(cfg.python, "python3");
        assert_eq!(cfg.dirs.env["local"], PathBuf::from(".envs"));
    }

    #[test]
    fn expand_home_leaves_other_paths_alone() {
        assert_eq!(expand_home(Path::new("/abs/path")), PathBuf::from("/abs/path"));
        assert_eq!(expand_home(Path::new("rel")), PathBuf::from("rel"));
    }
}

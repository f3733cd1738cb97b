//! Test-only helpers: in-memory terminals, a recording fake environment and
//! a scripted command runner.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Write};
use std::process::Command;
use std::rc::Rc;

use anyhow::{Result, anyhow, bail};
use tempfile::TempDir;

use crate::app::Application;
use crate::io::config::{AppConfig, AppConfigBuilder, UserConfig};
use crate::io::environment::Environment;
use crate::io::process::{CommandRunner, shell};
use crate::io::terminal::Terminal;

/// Owned copies of string literals.
pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}

/// Cloneable in-memory sink; clones share the same bytes.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Terminal writing to two buffers (stdout, stderr) and reading `input`.
pub fn buffered_terminal(verbosity: i32, input: &str) -> (Terminal, SharedBuffer, SharedBuffer) {
    let out = SharedBuffer::default();
    let err = SharedBuffer::default();
    let terminal = Terminal::with_streams(
        verbosity,
        Box::new(out.clone()),
        Box::new(err.clone()),
        Box::new(Cursor::new(input.to_string().into_bytes())),
    );
    (terminal, out, err)
}

/// An application rooted in a temporary project with captured output.
pub struct TestApp {
    pub app: Application,
    pub out: SharedBuffer,
    pub err: SharedBuffer,
    pub temp: TempDir,
}

impl TestApp {
    pub fn new(verbosity: i32) -> Self {
        Self::build(verbosity, "", |_| {})
    }

    pub fn with_input(verbosity: i32, input: &str) -> Self {
        Self::build(verbosity, input, |_| {})
    }

    pub fn with_config(verbosity: i32, configure: impl FnOnce(&mut AppConfig)) -> Self {
        Self::build(verbosity, "", configure)
    }

    fn build(verbosity: i32, input: &str, configure: impl FnOnce(&mut AppConfig)) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfigBuilder::new()
            .project_root(temp.path().join("project"))
            .data_dir(Some(temp.path().join("data")))
            .cache_dir(Some(temp.path().join("cache")))
            .verbosity(verbosity)
            .user_config(UserConfig::default())
            .build()
            .expect("app config");
        configure(&mut config);
        let (terminal, out, err) = buffered_terminal(verbosity, input);
        Self {
            app: Application::new(config, terminal),
            out,
            err,
            temp,
        }
    }
}

/// Environment that records every call instead of doing anything.
///
/// Shell commands succeed unless given an exit code with
/// [`FakeEnvironment::with_exit_code`].
pub struct FakeEnvironment {
    exists: bool,
    skip_install: bool,
    dev_mode: bool,
    in_sync: bool,
    pre_install: Vec<String>,
    post_install: Vec<String>,
    exit_codes: BTreeMap<String, i32>,
    resolve_error: Option<String>,
    create_error: Option<String>,
    calls: RefCell<Vec<String>>,
    executed: RefCell<Vec<String>>,
}

impl Default for FakeEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEnvironment {
    pub fn new() -> Self {
        Self {
            exists: false,
            skip_install: false,
            dev_mode: true,
            in_sync: true,
            pre_install: Vec::new(),
            post_install: Vec::new(),
            exit_codes: BTreeMap::new(),
            resolve_error: None,
            create_error: None,
            calls: RefCell::new(Vec::new()),
            executed: RefCell::new(Vec::new()),
        }
    }

    pub fn existing(mut self) -> Self {
        self.exists = true;
        self
    }

    pub fn skip_install(mut self, skip: bool) -> Self {
        self.skip_install = skip;
        self
    }

    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    pub fn in_sync(mut self, in_sync: bool) -> Self {
        self.in_sync = in_sync;
        self
    }

    pub fn pre_install(mut self, commands: &[&str]) -> Self {
        self.pre_install = strings(commands);
        self
    }

    pub fn post_install(mut self, commands: &[&str]) -> Self {
        self.post_install = strings(commands);
        self
    }

    pub fn with_exit_code(mut self, command: &str, code: i32) -> Self {
        self.exit_codes.insert(command.to_string(), code);
        self
    }

    pub fn with_resolve_error(mut self, message: &str) -> Self {
        self.resolve_error = Some(message.to_string());
        self
    }

    pub fn failing_create(mut self, message: &str) -> Self {
        self.create_error = Some(message.to_string());
        self
    }

    /// Every recorded call in order; shell commands appear as `run: <command>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Literal commands handed to `run_shell_command`.
    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }

    fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_string());
    }
}

impl Environment for FakeEnvironment {
    fn name(&self) -> &str {
        "fake"
    }

    fn exists(&self) -> bool {
        self.record("exists");
        self.exists
    }

    fn skip_install(&self) -> bool {
        self.skip_install
    }

    fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    fn pre_install_commands(&self) -> &[String] {
        &self.pre_install
    }

    fn post_install_commands(&self) -> &[String] {
        &self.post_install
    }

    fn create(&self) -> Result<()> {
        self.record("create");
        match &self.create_error {
            Some(message) => bail!("{message}"),
            None => Ok(()),
        }
    }

    fn install_project(&self) -> Result<()> {
        self.record("install_project");
        Ok(())
    }

    fn install_project_dev_mode(&self) -> Result<()> {
        self.record("install_project_dev_mode");
        Ok(())
    }

    fn dependencies_in_sync(&self) -> Result<bool> {
        self.record("dependencies_in_sync");
        Ok(self.in_sync)
    }

    fn sync_dependencies(&self) -> Result<()> {
        self.record("sync_dependencies");
        Ok(())
    }

    fn resolve_commands(&self, commands: &[String]) -> Result<Vec<String>> {
        self.record("resolve_commands");
        match &self.resolve_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(commands.to_vec()),
        }
    }

    fn run_shell_command(&self, command: &str) -> Result<i32> {
        self.record(&format!("run: {command}"));
        self.executed.borrow_mut().push(command.to_string());
        Ok(self.exit_codes.get(command).copied().unwrap_or(0))
    }

    fn builder_command(&self, command: &str) -> Result<Command> {
        self.record(&format!("builder: {command}"));
        Ok(shell(command))
    }

    fn enter_command_context(&self) -> Result<()> {
        self.record("enter_command_context");
        Ok(())
    }

    fn exit_command_context(&self) {
        self.record("exit_command_context");
    }
}

/// Command runner returning queued exit codes and recording invocations.
pub struct ScriptedRunner {
    codes: RefCell<Vec<i32>>,
    invocations: RefCell<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new(codes: Vec<i32>) -> Self {
        Self {
            codes: RefCell::new(codes),
            invocations: RefCell::new(Vec::new()),
        }
    }

    pub fn invocations(&self) -> Vec<Vec<String>> {
        self.invocations.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, argv: &[String]) -> Result<i32> {
        self.invocations.borrow_mut().push(argv.to_vec());
        let mut codes = self.codes.borrow_mut();
        if codes.is_empty() {
            bail!("no scripted exit code left for {argv:?}");
        }
        Ok(codes.remove(0))
    }
}

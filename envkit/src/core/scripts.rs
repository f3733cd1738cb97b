//! Script expansion for environment commands.
//!
//! A command whose first word names a script is replaced by the script's
//! commands. Extra words become `{args}`; when a script command has no
//! `{args}` placeholder they are appended instead. Scripts may reference
//! other scripts. A continue-on-error marker on the invoking command carries
//! over to every command the script expands to.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::command::CONTINUE_ON_ERROR_MARKER;

const ARGS_PLACEHOLDER: &str = "{args}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("circular expansion detected for scripts: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("script `{0}` has no commands")]
    EmptyScript(String),
}

/// Named scripts plus static placeholders such as `{root}` or `{env_name}`.
#[derive(Debug, Clone, Default)]
pub struct ScriptTable {
    scripts: BTreeMap<String, Vec<String>>,
    placeholders: BTreeMap<String, String>,
}

impl ScriptTable {
    pub fn new(scripts: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            scripts,
            placeholders: BTreeMap::new(),
        }
    }

    /// Register `{name}` to be replaced by `value` in every command.
    pub fn with_placeholder(mut self, name: &str, value: impl Into<String>) -> Self {
        self.placeholders.insert(format!("{{{name}}}"), value.into());
        self
    }

    /// Expand every command in order.
    pub fn resolve(&self, commands: &[String]) -> Result<Vec<String>, ResolveError> {
        let mut resolved = Vec::new();
        for command in commands {
            let mut stack = Vec::new();
            self.expand(command, false, &mut stack, &mut resolved)?;
        }
        Ok(resolved)
    }

    fn expand(
        &self,
        command: &str,
        inherited_marker: bool,
        stack: &mut Vec<String>,
        out: &mut Vec<String>,
    ) -> Result<(), ResolveError> {
        let (marked, body) = match command.strip_prefix(CONTINUE_ON_ERROR_MARKER) {
            Some(body) => (true, body),
            None => (false, command),
        };
        let marked = marked || inherited_marker;
        let trimmed = body.trim_start();
        let (name, args) = match trimmed.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (trimmed, ""),
        };

        let Some(script) = self.scripts.get(name) else {
            let literal = self.fill_static(body).trim().to_string();
            out.push(with_marker(marked, literal));
            return Ok(());
        };

        if stack.iter().any(|entry| entry == name) {
            let mut cycle = stack.clone();
            cycle.push(name.to_string());
            return Err(ResolveError::Cycle(cycle));
        }
        if script.is_empty() {
            return Err(ResolveError::EmptyScript(name.to_string()));
        }

        stack.push(name.to_string());
        for entry in script {
            let filled = fill_args(&self.fill_static(entry), args);
            self.expand(filled.trim(), marked, stack, out)?;
        }
        stack.pop();
        Ok(())
    }

    /// Substitute the named placeholders; `{args}` is left alone.
    fn fill_static(&self, command: &str) -> String {
        let mut filled = command.to_string();
        for (placeholder, value) in &self.placeholders {
            filled = filled.replace(placeholder, value);
        }
        filled
    }
}

/// Substitute `{args}` in a script command, or append the arguments.
fn fill_args(command: &str, args: &str) -> String {
    if command.contains(ARGS_PLACEHOLDER) {
        return command.replace(ARGS_PLACEHOLDER, args);
    }
    let mut filled = command.to_string();
    if !args.is_empty() {
        filled.push(' ');
        filled.push_str(args);
    }
    filled
}

fn with_marker(marked: bool, command: String) -> String {
    if marked && !command.starts_with(CONTINUE_ON_ERROR_MARKER) {
        format!("{CONTINUE_ON_ERROR_MARKER}{command}")
    } else {
        command
    }
}

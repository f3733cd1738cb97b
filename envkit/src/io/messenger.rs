//! Builder side of the control channel.
//!
//! A builder started by envkit finds [`BUILDER_ENV_VAR`] set and reports
//! through tagged lines on its stdout instead of printing directly.

use std::io::{self, Stdout, Write};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::core::protocol::Procedure;

/// Set in the environment of every builder process envkit spawns.
pub const BUILDER_ENV_VAR: &str = "ENVKIT_BUILDER";

/// Whether this process runs as a builder attached to a parent envkit.
pub fn is_builder() -> bool {
    std::env::var_os(BUILDER_ENV_VAR).is_some_and(|value| !value.is_empty())
}

/// Writes tagged lines to a builder's stdout.
pub struct Messenger<W> {
    out: W,
}

impl Messenger<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Messenger<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Send one procedure, flushing so the parent sees it immediately.
    pub fn send(&mut self, procedure: &Procedure) -> Result<()> {
        let line = procedure.to_line()?;
        writeln!(self.out, "{line}").context("write control line")?;
        self.out.flush().context("flush control line")
    }

    pub fn display_info(&mut self, text: &str) -> Result<()> {
        self.send(&Procedure::new("display_info").arg(text))
    }

    pub fn abort(&mut self, text: &str, code: i32) -> Result<()> {
        self.send(&Procedure::new("abort").arg(text).kwarg("code", code))
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Interpret a command-line value as JSON when it parses, else as a string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse a `key=value` keyword argument.
pub fn parse_kwarg(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("keyword argument `{raw}` must look like key=value"))?;
    if key.is_empty() {
        return Err(anyhow!("keyword argument `{raw}` has an empty key"));
    }
    Ok((key.to_string(), parse_value(value)))
}

/// Build a procedure from command-line pieces.
pub fn procedure_from_cli(method: &str, args: &[String], kwargs: &[String]) -> Result<Procedure> {
    let mut procedure = Procedure::new(method);
    for arg in args {
        procedure = procedure.arg(parse_value(arg));
    }
    for raw in kwargs {
        let (key, value) = parse_kwarg(raw)?;
        procedure = procedure.kwarg(key, value);
    }
    Ok(procedure)
}

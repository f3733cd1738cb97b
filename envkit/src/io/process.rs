//! Helpers for running child processes and reading builder output.

use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::protocol::{ControlMessage, ProtocolError, parse_line};

/// How long a builder may keep running after its stdout is closed before it is killed.
pub const REAP_GRACE: Duration = Duration::from_secs(5);

/// Build a platform shell invocation for `command`.
pub fn shell(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Exit code of a finished process. Signals map to `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Run a shell command with inherited stdio and return its exit code.
#[instrument(skip(cwd, envs), fields(cwd = %cwd.display()))]
pub fn run_shell(command: &str, cwd: &Path, envs: &[(String, String)]) -> Result<i32> {
    let status = shell(command)
        .current_dir(cwd)
        .envs(envs.iter().map(|(k, v)| (k, v)))
        .status()
        .with_context(|| format!("spawn `{command}`"))?;
    let code = exit_code(status);
    debug!(code, "shell command finished");
    Ok(code)
}

/// Runs argv-style commands. Tests substitute scripted runners.
pub trait CommandRunner {
    fn run(&self, argv: &[String]) -> Result<i32>;
}

/// Runs commands directly with inherited stdio.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[instrument(skip_all, fields(program = argv.first().map(String::as_str)))]
    fn run(&self, argv: &[String]) -> Result<i32> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("empty command"))?;
        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("spawn {program}"))?;
        Ok(exit_code(status))
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Blocking iterator of decoded control messages, one per line, ending at EOF.
pub struct ControlMessages<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> ControlMessages<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Read and discard everything left in the stream.
    pub fn drain(&mut self) -> io::Result<u64> {
        io::copy(&mut self.reader, &mut io::sink())
    }
}

impl<R: BufRead> Iterator for ControlMessages<R> {
    type Item = Result<ControlMessage, ChannelError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                let line = String::from_utf8_lossy(&self.buf);
                Some(parse_line(&line).map_err(|err| {
                    warn!(err = %err, "malformed control line");
                    ChannelError::from(err)
                }))
            }
            Err(err) => Some(Err(err.into())),
        }
    }
}

/// A spawned builder whose stdout carries the control channel.
///
/// Dropping an unfinished builder closes its stdout and reaps it, killing it
/// if it does not exit within [`REAP_GRACE`].
pub struct BuilderProcess {
    child: Child,
    messages: Option<ControlMessages<BufReader<ChildStdout>>>,
    status: Option<ExitStatus>,
}

impl BuilderProcess {
    #[instrument(skip_all, fields(program = ?cmd.get_program()))]
    pub fn spawn(mut cmd: Command) -> Result<Self> {
        cmd.stdin(Stdio::null()).stdout(Stdio::piped());
        debug!("spawning builder process");
        let mut child = cmd.spawn().context("spawn builder")?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        Ok(Self {
            child,
            messages: Some(ControlMessages::new(BufReader::new(stdout))),
            status: None,
        })
    }

    /// Next decoded line, or `None` once the builder closes its stdout.
    pub fn next_message(&mut self) -> Result<Option<ControlMessage>, ChannelError> {
        match self.messages.as_mut() {
            Some(messages) => messages.next().transpose(),
            None => Ok(None),
        }
    }

    /// Consume all pending output, then wait for the builder to exit.
    ///
    /// Used before honoring an abort so the builder never blocks on a full pipe.
    pub fn drain(&mut self) -> Result<i32> {
        if let Some(messages) = self.messages.as_mut() {
            let discarded = messages.drain().context("drain builder output")?;
            debug!(discarded, "drained builder output");
        }
        self.finish()
    }

    /// Close stdout and wait for the builder to exit.
    pub fn finish(&mut self) -> Result<i32> {
        self.messages = None;
        let status = match self.status {
            Some(status) => status,
            None => {
                let status = self.child.wait().context("wait for builder")?;
                self.status = Some(status);
                status
            }
        };
        debug!(exit_code = ?status.code(), "builder finished");
        Ok(exit_code(status))
    }
}

impl Drop for BuilderProcess {
    fn drop(&mut self) {
        if self.status.is_some() {
            return;
        }
        self.messages = None;
        match self.child.wait_timeout(REAP_GRACE) {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                warn!(
                    grace_secs = REAP_GRACE.as_secs(),
                    "builder still running, killing"
                );
                if let Err(err) = self.child.kill() {
                    warn!(err = %err, "failed to kill builder");
                }
                if let Err(err) = self.child.wait() {
                    warn!(err = %err, "failed to reap builder");
                }
            }
        }
    }
}

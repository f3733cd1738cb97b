//! Failures that end an envkit invocation.
//!
//! Every failure carries the exit code the process should terminate with and
//! an optional message. Failures travel up as values; only the top-level
//! driver turns them into a process exit.

use thiserror::Error;

use crate::core::protocol::ProtocolError;
use crate::io::process::ChannelError;

#[derive(Debug, Error)]
pub enum Failure {
    /// The environment could not expand its commands.
    #[error("{0}")]
    CommandResolution(String),
    /// A resolved command exited non-zero and the batch stopped.
    #[error("{}", describe(.code, .message))]
    CommandExecution { code: i32, message: Option<String> },
    /// A builder wrote a tagged line that could not be honored.
    #[error("builder protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),
    #[error("Environment `{env}` has unknown type: {env_type}")]
    UnknownEnvironmentType { env: String, env_type: String },
    /// The package installer exited non-zero.
    #[error("command `{command}` failed with exit code {code}")]
    Installer { code: i32, command: String },
    /// An explicit abort, or a builder that exited non-zero.
    #[error("{}", describe(.code, .message))]
    Exit { code: i32, message: Option<String> },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn describe(code: &i32, message: &Option<String>) -> String {
    match message {
        Some(message) => message.clone(),
        None => format!("exited with code {code}"),
    }
}

impl Failure {
    /// Exit code the process terminates with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandExecution { code, .. }
            | Self::Installer { code, .. }
            | Self::Exit { code, .. } => *code,
            Self::CommandResolution(_)
            | Self::Protocol(_)
            | Self::UnknownEnvironment(_)
            | Self::UnknownEnvironmentType { .. }
            | Self::Other(_) => crate::exit_codes::FAILURE,
        }
    }

    /// Message shown as an error before exiting; `None` exits silently.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::CommandExecution { message, .. } | Self::Exit { message, .. } => message.clone(),
            Self::Other(err) => Some(format!("{err:#}")),
            other => Some(other.to_string()),
        }
    }
}

impl From<ChannelError> for Failure {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Protocol(err) => Self::Protocol(err),
            ChannelError::Io(err) => {
                Self::Other(anyhow::Error::new(err).context("read builder output"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_failures_have_no_message() {
        let failure = Failure::CommandExecution {
            code: 3,
            message: None,
        };
        assert_eq!(failure.exit_code(), 3);
        assert_eq!(failure.message(), None);
    }

    #[test]
    fn lookup_failures_exit_with_generic_code() {
        let failure = Failure::UnknownEnvironmentType {
            env: "docs".to_string(),
            env_type: "podman".to_string(),
        };
        assert_eq!(failure.exit_code(), 1);
        assert_eq!(
            failure.message().as_deref(),
            Some("Environment `docs` has unknown type: podman")
        );
    }

    #[test]
    fn other_errors_render_their_chain() {
        let failure = Failure::from(anyhow::anyhow!("disk full").context("create environment"));
        assert_eq!(
            failure.message().as_deref(),
            Some("create environment: disk full")
        );
    }
}

//! The bounded set of parent-side operations builders may trigger.
//!
//! [`SafeApplication`] exposes exactly the operations named in
//! [`CAPABILITY_NAMES`](crate::core::capability::CAPABILITY_NAMES). Tagged
//! lines reach it only as a bound [`Capability`], so there is no path from
//! a builder to anything else in the application.

use anyhow::Result;
use tracing::debug;

use crate::app::Application;
use crate::builder;
use crate::core::capability::{Capability, DisplayStyle};
use crate::error::Failure;
use crate::io::process::BuilderProcess;
use crate::io::terminal::StatusGuard;

pub struct SafeApplication<'a> {
    app: &'a Application,
}

impl<'a> SafeApplication<'a> {
    pub(crate) fn new(app: &'a Application) -> Self {
        Self { app }
    }

    /// The failure to propagate for an abort; an empty `text` aborts silently.
    pub fn abort(&self, text: &str, code: i32) -> Failure {
        Failure::Exit {
            code,
            message: (!text.is_empty()).then(|| text.to_string()),
        }
    }

    pub fn display(&self, text: &str) {
        self.app.terminal().display(text);
    }

    pub fn display_critical(&self, text: &str) {
        self.app.terminal().display_critical(text);
    }

    pub fn display_info(&self, text: &str) {
        self.app.terminal().display_info(text);
    }

    pub fn display_error(&self, text: &str) {
        self.app.terminal().display_error(text);
    }

    pub fn display_success(&self, text: &str) {
        self.app.terminal().display_success(text);
    }

    pub fn display_waiting(&self, text: &str) {
        self.app.terminal().display_waiting(text);
    }

    pub fn display_warning(&self, text: &str) {
        self.app.terminal().display_warning(text);
    }

    pub fn display_debug(&self, text: &str, level: u8) {
        self.app.terminal().display_debug(text, level, "\n");
    }

    pub fn display_mini_header(&self, text: &str) {
        self.app.terminal().display_mini_header(text);
    }

    pub fn prompt(&self, text: &str, default: Option<&str>) -> Result<String> {
        self.app.terminal().prompt(text, default)
    }

    pub fn confirm(&self, text: &str, default: Option<bool>) -> Result<bool> {
        self.app.terminal().confirm(text, default)
    }

    pub fn status(&self, text: &str) -> StatusGuard {
        self.app.terminal().status(text)
    }

    pub fn status_if(&self, text: &str, condition: bool) -> StatusGuard {
        self.app.terminal().status_if(text, condition)
    }

    pub fn read_builder(&self, process: BuilderProcess) -> Result<String, Failure> {
        builder::read_builder(process)
    }

    /// Execute one bound capability received over the control channel.
    ///
    /// Answers to prompts are discarded; the channel only flows one way.
    /// A status cannot span several lines, so it is shown once as a waiting line.
    pub fn dispatch(&self, capability: Capability) -> Result<(), Failure> {
        debug!(name = capability.name(), ?capability, "dispatching capability");
        let terminal = self.app.terminal();
        match capability {
            Capability::Abort { text, code } => return Err(self.abort(&text, code)),
            Capability::Display { style, text, end } => terminal.display_styled(style, &text, &end),
            Capability::Debug { text, level, end } => terminal.display_debug(&text, level, &end),
            Capability::Prompt { text, default } => {
                self.prompt(&text, default.as_deref())?;
            }
            Capability::Confirm { text, default } => {
                self.confirm(&text, default)?;
            }
            Capability::Status { text } => terminal.display_styled(DisplayStyle::Waiting, &text, "\n"),
            Capability::StatusIf { text, condition } => {
                if condition {
                    terminal.display_styled(DisplayStyle::Waiting, &text, "\n");
                }
            }
        }
        Ok(())
    }
}

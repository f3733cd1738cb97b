//! User-facing terminal output: styled display variants, status spinners and prompts.
//!
//! Uses owo-colors for terminal colors and indicatif for spinners. Each
//! variant has a minimum verbosity below which it is suppressed; `display`
//! and `display_critical` always print.

use std::cell::RefCell;
use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::debug;

use crate::core::capability::DisplayStyle;

/// Verbosity at or above which debug level 1 is shown.
const DEBUG_BASE_VERBOSITY: i32 = 1;

pub struct Terminal {
    verbosity: i32,
    interactive: bool,
    color: bool,
    out: RefCell<Box<dyn Write>>,
    err: RefCell<Box<dyn Write>>,
    input: RefCell<Box<dyn BufRead>>,
}

impl Terminal {
    /// Terminal bound to the process's standard streams.
    pub fn stdio(verbosity: i32) -> Self {
        let interactive = io::stdin().is_terminal() && io::stderr().is_terminal();
        let color = io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self {
            verbosity,
            interactive,
            color,
            out: RefCell::new(Box::new(io::stdout())),
            err: RefCell::new(Box::new(io::stderr())),
            input: RefCell::new(Box::new(io::BufReader::new(io::stdin()))),
        }
    }

    /// Non-interactive, uncolored terminal over arbitrary streams.
    pub fn with_streams(
        verbosity: i32,
        out: Box<dyn Write>,
        err: Box<dyn Write>,
        input: Box<dyn BufRead>,
    ) -> Self {
        Self {
            verbosity,
            interactive: false,
            color: false,
            out: RefCell::new(out),
            err: RefCell::new(err),
            input: RefCell::new(input),
        }
    }

    pub fn verbosity(&self) -> i32 {
        self.verbosity
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity > 0
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity < 0
    }

    pub fn display(&self, text: &str) {
        self.display_styled(DisplayStyle::Plain, text, "\n");
    }

    pub fn display_critical(&self, text: &str) {
        self.display_styled(DisplayStyle::Critical, text, "\n");
    }

    pub fn display_info(&self, text: &str) {
        self.display_styled(DisplayStyle::Info, text, "\n");
    }

    pub fn display_error(&self, text: &str) {
        self.display_styled(DisplayStyle::Error, text, "\n");
    }

    pub fn display_success(&self, text: &str) {
        self.display_styled(DisplayStyle::Success, text, "\n");
    }

    pub fn display_waiting(&self, text: &str) {
        self.display_styled(DisplayStyle::Waiting, text, "\n");
    }

    pub fn display_warning(&self, text: &str) {
        self.display_styled(DisplayStyle::Warning, text, "\n");
    }

    pub fn display_mini_header(&self, text: &str) {
        self.display_styled(DisplayStyle::MiniHeader, text, "\n");
    }

    /// Debug output, shown from verbosity `level` upwards (levels 1-3).
    pub fn display_debug(&self, text: &str, level: u8, end: &str) {
        if self.verbosity < DEBUG_BASE_VERBOSITY - 1 + i32::from(level) {
            return;
        }
        let styled = if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        };
        self.write_err(&styled, end);
    }

    /// Print `text` followed by `end` in the given style, honoring verbosity.
    pub fn display_styled(&self, style: DisplayStyle, text: &str, end: &str) {
        if self.verbosity < min_verbosity(style) {
            return;
        }
        let text = match style {
            DisplayStyle::MiniHeader => format!("[{text}]"),
            _ => text.to_string(),
        };
        let styled = if self.color { paint(style, &text) } else { text };
        match style {
            DisplayStyle::Plain | DisplayStyle::MiniHeader => self.write_out(&styled, end),
            _ => self.write_err(&styled, end),
        }
    }

    /// Show a status indicator until the returned guard is dropped.
    pub fn status(&self, message: &str) -> StatusGuard {
        if self.interactive && !self.is_quiet() {
            debug!(status = message, "status spinner");
            return StatusGuard {
                spinner: Some(spinner(message)),
            };
        }
        self.display_waiting(message);
        StatusGuard { spinner: None }
    }

    /// Like [`Terminal::status`], but does nothing unless `condition` holds.
    pub fn status_if(&self, message: &str, condition: bool) -> StatusGuard {
        if condition {
            self.status(message)
        } else {
            StatusGuard { spinner: None }
        }
    }

    /// Ask for a line of text. An empty answer selects `default` when given.
    pub fn prompt(&self, text: &str, default: Option<&str>) -> Result<String> {
        let question = match default {
            Some(default) => format!("{text} [{default}]: "),
            None => format!("{text}: "),
        };
        loop {
            self.write_err(&question, "");
            let Some(answer) = self.read_answer()? else {
                bail!("no input available for prompt: {text}");
            };
            match (answer.is_empty(), default) {
                (false, _) => return Ok(answer),
                (true, Some(default)) => return Ok(default.to_string()),
                (true, None) => continue,
            }
        }
    }

    /// Ask a yes/no question. An empty answer selects `default` when given.
    pub fn confirm(&self, text: &str, default: Option<bool>) -> Result<bool> {
        let choices = match default {
            Some(true) => "[Y/n]",
            Some(false) => "[y/N]",
            None => "[y/n]",
        };
        loop {
            self.write_err(&format!("{text} {choices}: "), "");
            let Some(answer) = self.read_answer()? else {
                bail!("no input available for confirmation: {text}");
            };
            match (answer.to_ascii_lowercase().as_str(), default) {
                ("y" | "yes", _) => return Ok(true),
                ("n" | "no", _) => return Ok(false),
                ("", Some(default)) => return Ok(default),
                _ => self.write_err("Error: invalid input", "\n"),
            }
        }
    }

    fn read_answer(&self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .input
            .borrow_mut()
            .read_line(&mut line)
            .context("read answer")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn write_out(&self, text: &str, end: &str) {
        write_stream(&mut **self.out.borrow_mut(), text, end);
    }

    fn write_err(&self, text: &str, end: &str) {
        write_stream(&mut **self.err.borrow_mut(), text, end);
    }
}

fn write_stream(stream: &mut dyn Write, text: &str, end: &str) {
    if let Err(err) = try_write(stream, text, end) {
        debug!(err = %err, "terminal write failed");
    }
}

fn try_write(stream: &mut dyn Write, text: &str, end: &str) -> io::Result<()> {
    stream.write_all(text.as_bytes())?;
    stream.write_all(end.as_bytes())?;
    stream.flush()
}

fn min_verbosity(style: DisplayStyle) -> i32 {
    match style {
        DisplayStyle::Plain | DisplayStyle::Critical => i32::MIN,
        DisplayStyle::Error => -2,
        DisplayStyle::Warning => -1,
        DisplayStyle::Info
        | DisplayStyle::Success
        | DisplayStyle::Waiting
        | DisplayStyle::MiniHeader => 0,
    }
}

fn paint(style: DisplayStyle, text: &str) -> String {
    match style {
        DisplayStyle::Plain | DisplayStyle::Info => text.to_string(),
        DisplayStyle::Critical | DisplayStyle::Error => text.red().bold().to_string(),
        DisplayStyle::Success => text.cyan().bold().to_string(),
        DisplayStyle::Waiting => text.magenta().bold().to_string(),
        DisplayStyle::Warning => text.yellow().bold().to_string(),
        DisplayStyle::MiniHeader => text.bold().to_string(),
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Scoped status indicator; the spinner is cleared on drop.
#[must_use = "the status is released as soon as the guard is dropped"]
pub struct StatusGuard {
    spinner: Option<ProgressBar>,
}

impl Drop for StatusGuard {
    fn drop(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

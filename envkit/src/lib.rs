//! Project environment manager with a builder control channel.
//!
//! envkit provisions per-project environments, runs commands inside them and
//! supervises builder processes that report back over their stdout. The
//! crate keeps a strict split:
//!
//! - **[`core`]**: Pure logic (wire format, capability binding, command
//!   semantics, script expansion). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting adapters (config files, terminal, processes,
//!   environment implementations).
//!
//! Orchestration modules ([`provision`], [`commands`], [`builder`],
//! [`plugins`]) combine the two to implement the CLI commands.

pub mod app;
pub mod builder;
pub mod commands;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod facade;
pub mod io;
pub mod logging;
pub mod plugins;
pub mod provision;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

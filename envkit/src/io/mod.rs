//! I/O adapters: terminal, processes, configuration and environments.

pub mod config;
pub mod environment;
pub mod local_env;
pub mod messenger;
pub mod process;
pub mod terminal;

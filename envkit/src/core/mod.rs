//! Deterministic, pure logic shared by the envkit core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (command strings, wire lines, decoded procedures) and return
//! deterministic outputs suitable for tests.

pub mod capability;
pub mod command;
pub mod protocol;
pub mod scripts;
pub mod verbosity;

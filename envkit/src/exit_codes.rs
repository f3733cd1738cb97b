//! Stable exit codes for envkit CLI commands.
//!
//! Codes reported by commands and builders are passed through unchanged;
//! these are only the ones envkit produces itself.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid configuration, unknown environment, protocol violation or other errors.
pub const FAILURE: i32 = 1;

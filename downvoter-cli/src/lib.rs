//! Downvoter CLI library
//!
//! The `downvoter` binary is a thin wrapper around these modules. They are
//! exposed as a library so integration tests can drive command handlers
//! directly.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

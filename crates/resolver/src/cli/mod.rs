//! CLI argument parsing and command execution

pub mod args;
pub mod commands;

pub use args::ResolverArgs;
pub use commands::{execute_command, Commands};

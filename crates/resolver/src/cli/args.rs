//! Command-line arguments

use clap::Parser;

use super::Commands;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct ResolverArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "resolver.toml")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Generate a sample configuration file at the --config path and exit
    #[arg(long)]
    pub gen_config: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl ResolverArgs {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

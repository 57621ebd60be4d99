//! GUID resolver binary
//!
//! Converts account identifiers to anti-cheat fingerprints and resolves
//! fingerprints back through the generated reverse index.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use resolver::cli::{execute_command, ResolverArgs};
use resolver::{ResolverConfig, ResolverState};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ResolverArgs::parse_args();

    if args.gen_config {
        return run_config_generation(&args.config);
    }

    init_logging(&args.log_level)?;

    let config = load_config(&args.config)?;
    let state = ResolverState::new(config).await?;

    match args.command {
        Some(command) => execute_command(command, &state).await,
        None => {
            eprintln!("No command provided. Use --help for available commands.");
            Ok(())
        }
    }
}

fn run_config_generation(output_path: &str) -> Result<()> {
    let config = ResolverConfig::default();
    let toml_content = toml::to_string_pretty(&config)?;
    std::fs::write(output_path, toml_content)?;

    println!("Generated configuration file: {output_path}");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .init();

    Ok(())
}

fn load_config(config_path: &str) -> Result<ResolverConfig> {
    use std::path::Path;

    let path = Path::new(config_path);
    let config = if path.exists() {
        ResolverConfig::load_from_file(path)?
    } else {
        ResolverConfig::load()?
    };

    Ok(config)
}

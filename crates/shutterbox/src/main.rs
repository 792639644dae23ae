use std::path::PathBuf;

use anyhow::{Context, Result};
use cas::ContentHash;
use clap::{Parser, Subcommand};
use shutterconf::{ConfigSources, ShutterConfig};

/// Content-addressed image server
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file, used in place of ./shutterbox.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Local cache root (overrides config)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Print the identifier a file would be stored under
    Hash {
        file: PathBuf,
    },

    /// Print the effective configuration and where it came from
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port, cache_dir } => {
            let (mut config, sources) = load_config(cli.config.as_deref())?;
            if let Some(port) = port {
                config.bind.http_port = port;
            }
            if let Some(cache_dir) = cache_dir {
                config.paths.cache_dir = Some(cache_dir);
            }

            shutterbox::telemetry::init(&config.telemetry)
                .context("Failed to initialize telemetry")?;
            log_sources(&sources);

            shutterbox::server::run(config).await
        }
        Command::Hash { file } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("{}", ContentHash::from_data(&data));
            Ok(())
        }
        Command::Config => {
            let (config, sources) = load_config(cli.config.as_deref())?;
            for file in &sources.files {
                println!("# loaded: {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env: {}", var);
            }
            print!("{}", config.to_toml());
            Ok(())
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<(ShutterConfig, ConfigSources)> {
    ShutterConfig::load_with_sources_from(path).context("Failed to load configuration")
}

fn log_sources(sources: &ConfigSources) {
    if sources.files.is_empty() {
        tracing::info!("No config files found, using defaults");
    }
    for file in &sources.files {
        tracing::info!("Loaded config: {}", file.display());
    }
    if !sources.env_overrides.is_empty() {
        tracing::debug!(vars = ?sources.env_overrides, "Environment overrides applied");
    }
}

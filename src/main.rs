use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use evm_sandbox::{Config, Node};

#[derive(Parser)]
#[command(name = "evm-sandbox")]
#[command(about = "A single-node EVM execution sandbox with a JSON-RPC front end", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the genesis accounts and serve JSON-RPC
    Run {
        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overrides `rpc.port`
        #[arg(short, long)]
        port: Option<u16>,

        /// Overrides `rpc.host`
        #[arg(long)]
        host: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::from_file(path)
        }
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run { config, port, host } => {
            let mut config = load_config(config)?;
            if let Some(port) = port {
                config.rpc.port = port;
            }
            if let Some(host) = host {
                config.rpc.host = host;
            }
            run(config).await?;
        }

        Commands::Config { config } => {
            let config = load_config(config)?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    info!("Starting EVM sandbox v{}", evm_sandbox::VERSION);
    info!("HTTP-RPC: http://{}", config.rpc_addr()?);

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
        }
    };

    match config.database.backend {
        #[cfg(feature = "rocksdb")]
        evm_sandbox::config::DatabaseBackend::Rocksdb => Node::open(config)?.run_until(shutdown).await,
        _ => Node::from_config(config)?.run_until(shutdown).await,
    }
}

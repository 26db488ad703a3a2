//! runbridge server CLI
//!
//! Serves interactive code execution over WebSocket, plus a few commands for
//! inspecting and creating configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use runbridge::{Analyzer, Config, EXAMPLE_CONFIG, LanguageId, Runner};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

mod server;

#[derive(Parser)]
#[command(name = "runbridge")]
#[command(about = "A server for streaming interactive code execution")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: runbridge.toml)
        #[arg(short, long, default_value = "runbridge.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run the HTTP/WebSocket server
    Serve {
        /// Address to listen on (overrides the configured `bind`)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// List available languages
    Languages,

    /// Show the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
    } else {
        debug!("using default configuration");
    }
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Serve { bind } => serve(config, bind).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn serve(config: Config, bind: Option<SocketAddr>) -> Result<()> {
    let addr = bind.unwrap_or(config.bind);

    warn!(
        "submitted programs run with the privileges of this process; \
         run the server inside a container, jail or VM"
    );

    let analyzer = Analyzer::new(config.analyze.clone());
    if !analyzer.has_key() {
        warn!("no analyze API key configured; /analyze will report an error");
    }

    let state = server::AppState {
        runner: Runner::new(config),
        analyzer,
    };
    server::serve(addr, state).await
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    for id in LanguageId::ALL {
        if id.layout().is_none() {
            println!("  {:<12} rendered by the client", id.key());
            continue;
        }
        let Ok(lang) = config.get_language(id) else {
            println!("  {:<12} (not configured)", id.key());
            continue;
        };
        let lang_type = if lang.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        println!("  {:<12} {} ({})", id.key(), lang.name, lang_type);
    }
}

fn show_config(config: &Config) {
    println!("Server:");
    println!("  Bind address: {}", config.bind);
    println!("  Scratch directory: {}", config.scratch_dir().display());
    println!();
    println!("Streaming:");
    println!("  Chunk size: {} bytes", config.stream.chunk_size);
    println!("  Channel capacity: {} frames", config.stream.channel_capacity);
    println!();
    println!("Analyze:");
    println!("  Model: {}", config.analyze.model);
    println!("  Base URL: {}", config.analyze.base_url);
    println!(
        "  API key: {}",
        if config.analyze.api_key.is_some() {
            "configured"
        } else {
            "not set"
        }
    );
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}

mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{cache::CacheSubcommand, config::ConfigSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hotload",
    about = "Fetch, verify and activate remotely hosted payloads with fallbacks",
    version,
    propagate_version = true
)]
struct Cli {
    /// Loader config file (default: ./hotload.yaml)
    #[arg(long, global = true, env = "HOTLOAD_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding persisted state (default: ./.hotload)
    #[arg(long, global = true, env = "HOTLOAD_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one update cycle: resolve, fetch, activate
    Run {
        /// Where to install the activated payload
        #[arg(long)]
        install: Option<PathBuf>,
    },

    /// Show the health record
    Health,

    /// Inspect or clear the local payload cache
    Cache {
        #[command(subcommand)]
        subcommand: CacheSubcommand,
    },

    /// Create or validate the loader config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let paths = root::Paths::resolve(cli.config.as_deref(), cli.state_dir.as_deref());

    let result = match cli.command {
        Commands::Run { install } => cmd::run::run(&paths, install, cli.json),
        Commands::Health => cmd::health::run(&paths, cli.json),
        Commands::Cache { subcommand } => cmd::cache::run(&paths, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&paths, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

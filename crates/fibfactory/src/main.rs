mod commands;
mod setup;
mod utils;

use clap::{Parser, Subcommand};
use fibfactory_core::EnvironmentId;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fibfactory")]
#[command(version)]
#[command(about = "Ephemeral environments for the fib service", long_about = None)]
struct Cli {
    /// Settings file (defaults to fibfactory.yaml discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print the outcome as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update an environment and print its URL
    Create {
        /// Environment identifier (letters, digits, '-' and '_')
        #[arg(short = 'e', long = "env-id", env = "FIBFACTORY_ENV_ID")]
        env_id: String,
    },
    /// List the environments of this project
    List,
    /// Destroy an environment and remove its stack
    Destroy {
        /// Environment identifier (letters, digits, '-' and '_')
        #[arg(short = 'e', long = "env-id", env = "FIBFACTORY_ENV_ID")]
        env_id: String,
    },
}

impl Commands {
    fn env_id(&self) -> Option<&str> {
        match self {
            Commands::Create { env_id } | Commands::Destroy { env_id } => Some(env_id),
            Commands::List => None,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        utils::print_error(&e);
        std::process::exit(utils::exit_code(&e));
    }
}

/// Logs go to stderr so that stdout stays parseable with --json
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Reject a bad identifier before touching settings or the engine
    if let Some(env_id) = cli.command.env_id() {
        EnvironmentId::parse(env_id)?;
    }

    let (settings, settings_path) = fibfactory_config::load_settings(cli.config.as_deref())?;
    if !cli.json {
        utils::print_loaded_settings(settings_path.as_deref());
    }

    let lifecycle = setup::lifecycle(&settings).await?;

    match cli.command {
        Commands::Create { env_id } => {
            commands::create::handle(&lifecycle, &env_id, cli.json).await
        }
        Commands::List => commands::list::handle(&lifecycle, cli.json).await,
        Commands::Destroy { env_id } => {
            commands::destroy::handle(&lifecycle, &env_id, cli.json).await
        }
    }
}

use clap::{Parser, Subcommand};
use conveyor::config::resolve_config_path;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(about = "Diagnostics log ingestion", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a local log file and print its records as JSON lines
    Parse {
        path: PathBuf,
        #[arg(long, default_value = "bracketed")]
        parser: String,
        /// URI recorded on each record (defaults to the file path)
        #[arg(long)]
        uri: Option<String>,
        #[arg(long, default_value = "local")]
        type_key: String,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a starter config file
    Init {
        #[arg(long)]
        stdout: bool,
    },
    /// Load and validate the config file
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so `parse` output stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conveyor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            path,
            parser,
            uri,
            type_key,
        } => {
            conveyor::cli::parse::run(&path, &parser, uri.as_deref(), &type_key)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => {
                conveyor::cli::config::init(stdout)?;
            }
            ConfigAction::Check => {
                let config_path = resolve_config_path(cli.config.as_deref());
                conveyor::cli::config::check(config_path)?;
            }
        },
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use sest::config::{resolve_config_path, CONFIG_PATH_ENV};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sest")]
#[command(about = "Tail log files and render events from pattern matches", long_about = None)]
struct Cli {
    /// Config file [default: /etc/sest/config.yml]
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail the configured files and emit events (default)
    Run,
    /// Validate the config and list files and rules
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            sest::cli::run::run(&config_path).await?;
        }
        Some(Commands::Check) => {
            let ok = sest::cli::check::check(&config_path, &mut std::io::stdout())?;
            if !ok {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

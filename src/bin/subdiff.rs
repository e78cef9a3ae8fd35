//! subdiff CLI: batch diff and similarity reports for archived submissions.

use clap::Parser;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => {
            cli::run_command(*args).await?;
        }
        Commands::PrintDefaultConfig => {
            cli::print_default_config().await?;
        }
        Commands::InitConfig(args) => {
            cli::init_config(args).await?;
        }
        Commands::ValidateConfig(args) => {
            cli::validate_config(args).await?;
        }
    }

    Ok(())
}

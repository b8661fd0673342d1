//! wgsteer - WireGuard selective-routing rule regenerator.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use wgsteer::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Routes { dry_run } => wgsteer::commands::routes::run(dry_run, &cli.config).await,
        Commands::Ipset { dry_run } => wgsteer::commands::ipset::run(dry_run, &cli.config).await,
        Commands::Check { ip } => wgsteer::commands::check::run(&ip, &cli.config).await,
        Commands::Diagnose { target } => {
            wgsteer::commands::diagnose::run(&target, &cli.config).await
        }
        Commands::Version => {
            println!("wgsteer {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

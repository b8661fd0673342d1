//! Routes-variant entry point: AllowedIPs rewrite + `wg syncconf`.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::applier::RoutesApplier;
use crate::cmd::{CommandRunner, SystemRunner};
use crate::config::Config;

pub async fn run(dry_run: bool, config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
    let applier = RoutesApplier::new(
        runner.clone(),
        &config.wireguard.interface,
        &config.wireguard.config_file,
    );

    super::run_pipeline(&config, &applier, runner.as_ref(), dry_run).await?;
    Ok(())
}

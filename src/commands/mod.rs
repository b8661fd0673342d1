//! CLI command implementations.

pub mod check;
pub mod diagnose;
pub mod ipset;
pub mod routes;

use anyhow::{Context, Result};
use ipnet::IpNet;
use std::fmt;
use tracing::info;

use crate::applier::{check_root, check_tools, RuleApplier};
use crate::cmd::CommandRunner;
use crate::combiner;
use crate::config::Config;
use crate::lists;
use crate::lock::LockGuard;
use crate::resolver::Resolver;

/// Stage a run is in, for logs and failure reports. A run is in exactly
/// one stage at a time and never goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Loading,
    Resolving,
    Combining,
    Applying,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Loading => "loading",
            RunStage::Resolving => "resolving",
            RunStage::Combining => "combining",
            RunStage::Applying => "applying",
        };
        f.write_str(name)
    }
}

/// Shared load → resolve → combine → apply pipeline for both variants.
///
/// With `dry_run` the final ruleset is computed and reported but nothing
/// is applied; no root or lock is needed for that.
pub async fn run_pipeline(
    config: &Config,
    applier: &dyn RuleApplier,
    runner: &dyn CommandRunner,
    dry_run: bool,
) -> Result<Vec<IpNet>> {
    info!("stage: {}", RunStage::Loading);
    let include = lists::load_prefix_file(&config.include_file)
        .with_context(|| format!("{} stage failed", RunStage::Loading))?;
    let exclude = lists::load_prefix_file(&config.exclude_file)
        .with_context(|| format!("{} stage failed", RunStage::Loading))?;
    info!(
        "loaded {} include and {} exclude overrides",
        include.len(),
        exclude.len()
    );

    info!("stage: {}", RunStage::Resolving);
    let resolver = Resolver::new(config.http_timeout_secs)
        .with_context(|| format!("{} stage failed", RunStage::Resolving))?;
    let resolved = resolver
        .resolve(config)
        .await
        .with_context(|| format!("{} stage failed", RunStage::Resolving))?;

    info!("stage: {}", RunStage::Combining);
    let final_set = combiner::combine(&resolved, &include, &exclude);
    info!("final ruleset: {} prefixes", final_set.len());

    if dry_run {
        println!(
            "[DRY RUN] {} resolved + {} include - {} exclude -> {} prefixes, nothing applied",
            resolved.len(),
            include.len(),
            exclude.len(),
            final_set.len()
        );
        return Ok(final_set);
    }

    info!("stage: {}", RunStage::Applying);
    check_root().with_context(|| format!("{} stage failed", RunStage::Applying))?;
    check_tools(runner, applier.required_tools())
        .with_context(|| format!("{} stage failed", RunStage::Applying))?;
    let _lock = LockGuard::acquire()
        .with_context(|| format!("{} stage failed", RunStage::Applying))?;

    applier
        .apply(&final_set)
        .await
        .with_context(|| format!("{} stage failed", RunStage::Applying))?;

    println!(
        "[OK] applied {} prefixes via {}",
        final_set.len(),
        applier.describe()
    );
    Ok(final_set)
}

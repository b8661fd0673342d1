//! # wgsteer - WireGuard selective-routing rule regenerator
//!
//! Regenerates the network rules that steer traffic into a WireGuard
//! tunnel, from country IP-allocation data plus local include/exclude
//! override lists. Two appliers share one pipeline:
//!
//! ```text
//! include.txt/exclude.txt ──► Loader ─┐
//! RIPE country table ──────► Resolver ┼─► Combiner ─► final ruleset
//!                                     │                    │
//!                        routes: AllowedIPs + wg syncconf ◄┤
//!                        ipset:  staging swap + iptables  ◄┘
//! ```
//!
//! The final ruleset is `(resolved ∪ include) − exclude`; excludes always
//! win and partially-excluded prefixes are split. Runs are idempotent and
//! all-or-nothing: a failed apply leaves prior OS state intact.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wgsteer::applier::RoutesApplier;
//! use wgsteer::cmd::SystemRunner;
//! use wgsteer::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_or_default("/etc/wgsteer/config.yaml".as_ref())?;
//!     let runner = Arc::new(SystemRunner::new());
//!     let applier = RoutesApplier::new(
//!         runner.clone(),
//!         &config.wireguard.interface,
//!         &config.wireguard.config_file,
//!     );
//!     wgsteer::commands::run_pipeline(&config, &applier, runner.as_ref(), false).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`applier`] - Routes and ipset/iptables appliers
//! - [`cli`] - Command-line interface definitions
//! - [`cmd`] - External command execution with captured output
//! - [`combiner`] - Prefix-set algebra (coalesce, subtract, combine)
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing and validation
//! - [`error`] - Error taxonomy
//! - [`lists`] - Include/exclude list loading
//! - [`lock`] - Single-instance locking
//! - [`resolver`] - Range data source (RIPE country tables or a file)

pub mod applier;
pub mod cli;
pub mod cmd;
pub mod combiner;
pub mod commands;
pub mod config;
pub mod error;
pub mod lists;
pub mod lock;
pub mod resolver;

pub use cli::{Cli, Commands};
pub use combiner::PrefixSet;
pub use config::Config;
pub use error::Error;

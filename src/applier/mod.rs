//! Rule appliers: push the final prefix set into OS networking state.
//!
//! Two variants exist. The routes applier rewrites the WireGuard peer
//! config's AllowedIPs and live-syncs the interface; the ipset applier
//! swaps the set membership in the kernel and keeps iptables rules
//! pointing at it. Both must leave prior OS state intact on failure.

mod ipset;
mod routes;

use async_trait::async_trait;
use ipnet::IpNet;

pub use ipset::IpsetApplier;
pub use routes::{parse_allowed_ips, RoutesApplier};

use crate::cmd::{to_args, CommandRunner};
use crate::error::Error;

/// A strategy for applying the final ruleset to the OS.
#[async_trait]
pub trait RuleApplier: Send + Sync {
    /// Apply the ruleset. Must be all-or-nothing: on `Err` the previously
    /// active configuration stays in effect.
    async fn apply(&self, prefixes: &[IpNet]) -> Result<(), Error>;

    /// External binaries this applier shells out to.
    fn required_tools(&self) -> &'static [&'static str];

    /// Short name for logs.
    fn describe(&self) -> &'static str;
}

/// Verify the applier's external tools are present before any state is
/// touched, so a half-installed host fails in one obvious way.
pub fn check_tools(runner: &dyn CommandRunner, tools: &[&str]) -> Result<(), Error> {
    let missing: Vec<&str> = tools
        .iter()
        .filter(|tool| {
            runner
                .run(tool, &to_args(&["--version"]))
                .map(|out| !out.success)
                .unwrap_or(true)
        })
        .copied()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "missing required tools: {} (install wireguard-tools, ipset, iptables)",
            missing.join(", ")
        )))
    }
}

/// Check for root privileges. Firewall and WireGuard changes need euid 0.
pub fn check_root() -> Result<(), Error> {
    // SAFETY: geteuid() only reads the effective UID, has no preconditions
    // and cannot fail.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        return Err(Error::Config(
            "this operation requires root privileges, re-run with sudo".to_string(),
        ));
    }
    Ok(())
}

/// Render a prefix list as ipset/wg-ready strings.
pub fn render_prefixes(prefixes: &[IpNet]) -> Vec<String> {
    prefixes.iter().map(|n| n.to_string()).collect()
}

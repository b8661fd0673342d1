//! Check whether an address is covered by the current rules.
//!
//! Reports both views: live ipset membership (ipset variant) and the
//! AllowedIPs list in the WireGuard config (routes variant).

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::applier::parse_allowed_ips;
use crate::cmd::{to_args, CommandRunner, SystemRunner};
use crate::combiner;
use crate::config::Config;
use crate::lists;

pub async fn run(ip_str: &str, config_path: &Path) -> Result<()> {
    let target =
        lists::parse_entry(ip_str).ok_or_else(|| anyhow!("invalid IP or CIDR: {ip_str}"))?;

    let config = Config::load_or_default(config_path)?;
    let runner = SystemRunner::new();

    // Live kernel set. `ipset test` exits 0 for members.
    let canonical = target.to_string();
    let in_set = runner
        .run(
            "ipset",
            &to_args(&["test", &config.ipset.set_name, &canonical]),
        )
        .map(|out| out.success)
        .unwrap_or(false);
    println!(
        "ipset {}: {} is {}",
        config.ipset.set_name,
        target,
        if in_set { "COVERED" } else { "not covered" }
    );

    // Configured AllowedIPs.
    match std::fs::read_to_string(&config.wireguard.config_file) {
        Ok(content) => {
            let allowed = parse_allowed_ips(&content);
            let covered = allowed.iter().any(|n| combiner::covers(n, &target));
            println!(
                "AllowedIPs in {}: {} is {}",
                config.wireguard.config_file.display(),
                target,
                if covered { "COVERED" } else { "not covered" }
            );
        }
        Err(_) => println!(
            "AllowedIPs: config {} not readable, skipping",
            config.wireguard.config_file.display()
        ),
    }

    Ok(())
}

//! Runtime diagnostics: probe the OS state wgsteer manages.
//!
//! Read-only; safe to run while traffic flows.

use anyhow::{anyhow, Result};
use std::net::IpAddr;
use std::path::Path;

use crate::cmd::{to_args, CommandRunner, SystemRunner};
use crate::config::Config;

struct Probe {
    name: &'static str,
    ok: bool,
    detail: String,
}

pub async fn run(target: &str, config_path: &Path) -> Result<()> {
    // The target ends up on a command line; insist on a real address.
    let target: IpAddr = target
        .parse()
        .map_err(|_| anyhow!("invalid probe address: {target}"))?;

    let config = Config::load_or_default(config_path)?;
    let runner = SystemRunner::new();
    let iface = &config.wireguard.interface;
    let set = &config.ipset.set_name;

    let mut probes = Vec::new();

    match runner.run("ipset", &to_args(&["list", set])) {
        Ok(out) if out.success => {
            let members = count_members(&out.stdout);
            probes.push(Probe {
                name: "ipset set",
                ok: members > 0,
                detail: format!("{set} exists with {members} entries"),
            });
        }
        _ => probes.push(Probe {
            name: "ipset set",
            ok: false,
            detail: format!("{set} not found"),
        }),
    }

    let rule_present = runner
        .run(
            "iptables",
            &to_args(&[
                "-C", "OUTPUT", "-m", "set", "--match-set", set, "dst", "-o", iface, "-j",
                "ACCEPT",
            ]),
        )
        .map(|out| out.success)
        .unwrap_or(false);
    probes.push(Probe {
        name: "iptables rule",
        ok: rule_present,
        detail: if rule_present {
            format!("OUTPUT rule for {set} present")
        } else {
            format!("no OUTPUT rule references {set}")
        },
    });

    let link_up = runner
        .run("ip", &to_args(&["link", "show", iface]))
        .map(|out| out.success)
        .unwrap_or(false);
    probes.push(Probe {
        name: "interface",
        ok: link_up,
        detail: if link_up {
            format!("{iface} exists")
        } else {
            format!("{iface} not found")
        },
    });

    let wg_up = runner
        .run("wg", &to_args(&["show", iface]))
        .map(|out| out.success)
        .unwrap_or(false);
    probes.push(Probe {
        name: "wireguard",
        ok: wg_up,
        detail: if wg_up {
            format!("{iface} has a WireGuard device")
        } else {
            format!("wg show {iface} failed")
        },
    });

    let target_str = target.to_string();
    match runner.run("ip", &to_args(&["route", "get", &target_str])) {
        Ok(out) if out.success => {
            let via_tunnel = out.stdout.contains(iface.as_str());
            probes.push(Probe {
                name: "route",
                ok: via_tunnel,
                detail: if via_tunnel {
                    format!("{target} routes via {iface}")
                } else {
                    format!("{target} does NOT route via {iface}")
                },
            });
        }
        _ => probes.push(Probe {
            name: "route",
            ok: false,
            detail: format!("no route found for {target}"),
        }),
    }

    let forwarding = std::fs::read_to_string("/proc/sys/net/ipv4/ip_forward")
        .map(|s| s.trim() == "1")
        .unwrap_or(false);
    probes.push(Probe {
        name: "ip_forward",
        ok: forwarding,
        detail: if forwarding {
            "IPv4 forwarding enabled".to_string()
        } else {
            "IPv4 forwarding disabled (needed for routed LAN traffic)".to_string()
        },
    });

    let failed = probes.iter().filter(|p| !p.ok).count();
    println!("=== wgsteer diagnostics ===");
    for probe in &probes {
        let icon = if probe.ok { "[OK]  " } else { "[FAIL]" };
        println!("{icon} {}: {}", probe.name, probe.detail);
    }
    println!();
    println!("{} probes, {} failed", probes.len(), failed);

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Count entries in `ipset list` output: the lines after "Members:".
fn count_members(output: &str) -> usize {
    output
        .lines()
        .skip_while(|line| !line.starts_with("Members:"))
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .count()
}

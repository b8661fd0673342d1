//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wgsteer")]
#[command(author, version, about = "WireGuard selective-routing rule regenerator")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "/etc/wgsteer/config.yaml", global = true)]
    pub config: PathBuf,

    /// Quiet mode (for cron)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rewrite WireGuard AllowedIPs and live-sync the interface
    Routes {
        /// Compute and report the ruleset without applying it
        #[arg(long)]
        dry_run: bool,
    },

    /// Update the kernel ipset set and ensure iptables rules
    Ipset {
        /// Compute and report the ruleset without applying it
        #[arg(long)]
        dry_run: bool,
    },

    /// Check whether an address is covered by the current rules
    Check {
        /// IP address or CIDR to check
        ip: String,
    },

    /// Probe ipset, iptables, interface and routing state
    Diagnose {
        /// Address used for the route probe
        #[arg(long, default_value = "1.1.1.1")]
        target: String,
    },

    /// Show version
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_routes_command() {
        let cli = Cli::try_parse_from(["wgsteer", "routes"]).unwrap();
        match cli.command {
            Commands::Routes { dry_run } => assert!(!dry_run),
            _ => panic!("expected Routes command"),
        }
    }

    #[test]
    fn test_cli_ipset_dry_run() {
        let cli = Cli::try_parse_from(["wgsteer", "ipset", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Ipset { dry_run } => assert!(dry_run),
            _ => panic!("expected Ipset command"),
        }
    }

    #[test]
    fn test_cli_check_command() {
        let cli = Cli::try_parse_from(["wgsteer", "check", "151.101.194.217"]).unwrap();
        match cli.command {
            Commands::Check { ip } => assert_eq!(ip, "151.101.194.217"),
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    fn test_cli_diagnose_default_target() {
        let cli = Cli::try_parse_from(["wgsteer", "diagnose"]).unwrap();
        match cli.command {
            Commands::Diagnose { target } => assert_eq!(target, "1.1.1.1"),
            _ => panic!("expected Diagnose command"),
        }
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "wgsteer",
            "-q",
            "-v",
            "--config",
            "/custom/path.yaml",
            "routes",
        ])
        .unwrap();
        assert!(cli.quiet);
        assert!(cli.verbose);
        assert_eq!(cli.config.to_str().unwrap(), "/custom/path.yaml");
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["wgsteer", "frobnicate"]).is_err());
    }
}

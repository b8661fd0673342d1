//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Error;

/// Main configuration, read from YAML. Every field has a default matching
/// a single-country selective-routing gateway, so wgsteer runs without a
/// config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the baseline ranges come from.
    pub source: RangeSource,

    /// What the baseline means: everything *except* the listed ranges
    /// (foreign), or the listed ranges themselves.
    pub protect: ProtectMode,

    /// IPv4 prefixes longer than this are widened to it before combining.
    pub cutoff_prefix: u8,

    /// Override lists; missing files are empty sets.
    pub include_file: PathBuf,
    pub exclude_file: PathBuf,

    pub wireguard: WireguardConfig,
    pub ipset: IpsetConfig,

    /// Timeout for range-source HTTP requests, in seconds.
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RangeSource {
    /// RIPEstat country-resource-list, one or more ISO country codes.
    Ripe { countries: Vec<String> },
    /// Local prefix file in include/exclude format.
    File { path: PathBuf },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProtectMode {
    /// Baseline = 0.0.0.0/0 minus the resolved ranges. Routes all traffic
    /// except the listed (home-country) networks through the tunnel.
    #[default]
    Foreign,
    /// Baseline = the resolved ranges themselves.
    Listed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WireguardConfig {
    /// Interface name passed to `wg syncconf`.
    pub interface: String,
    /// Peer config file whose AllowedIPs line is rewritten.
    pub config_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpsetConfig {
    /// Name of the kernel set referenced from iptables.
    pub set_name: String,
    /// LAN-side interface for the FORWARD rule pair; no FORWARD rules
    /// are installed when unset.
    pub lan_interface: Option<String>,
    /// Write iptables-save/ipset save snapshots after a successful apply.
    pub persist: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: RangeSource::Ripe {
                countries: vec!["RU".to_string()],
            },
            protect: ProtectMode::Foreign,
            cutoff_prefix: 10,
            include_file: PathBuf::from("/etc/wgsteer/include.txt"),
            exclude_file: PathBuf::from("/etc/wgsteer/exclude.txt"),
            wireguard: WireguardConfig::default(),
            ipset: IpsetConfig::default(),
            http_timeout_secs: 10,
        }
    }
}

impl Default for WireguardConfig {
    fn default() -> Self {
        Self {
            interface: "wg1".to_string(),
            config_file: PathBuf::from("/etc/wireguard/wg1.conf"),
        }
    }
}

impl Default for IpsetConfig {
    fn default() -> Self {
        Self {
            set_name: "wg_allowed_ips".to_string(),
            lan_interface: None,
            persist: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file; a missing file yields the
    /// defaults. Validation failures are fatal either way.
    pub fn load_or_default(path: &Path) -> Result<Self, Error> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content).map_err(|e| {
                Error::Config(format!("failed to parse {}: {e}", path.display()))
            })?
        } else {
            debug!("config file {} not found, using defaults", path.display());
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would produce a nonsensical pipeline or leak
    /// unvetted strings onto command lines.
    pub fn validate(&self) -> Result<(), Error> {
        if let RangeSource::Ripe { countries } = &self.source {
            if countries.is_empty() {
                return Err(Error::Config("source.countries must not be empty".into()));
            }
            for cc in countries {
                if cc.len() != 2 || !cc.chars().all(|c| c.is_ascii_uppercase()) {
                    return Err(Error::Config(format!(
                        "invalid country code '{cc}': expected two uppercase ASCII letters"
                    )));
                }
            }
        }

        if self.cutoff_prefix == 0 || self.cutoff_prefix > 32 {
            return Err(Error::Config(format!(
                "cutoff_prefix must be in 1..=32, got {}",
                self.cutoff_prefix
            )));
        }

        validate_token("ipset.set_name", &self.ipset.set_name)?;
        validate_token("wireguard.interface", &self.wireguard.interface)?;
        if let Some(lan) = &self.ipset.lan_interface {
            validate_token("ipset.lan_interface", lan)?;
        }

        Ok(())
    }
}

/// Set and interface names end up as command-line arguments; restrict them
/// to a safe character set.
fn validate_token(field: &str, value: &str) -> Result<(), Error> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "invalid {field} '{value}': use only alphanumerics, '_', '-', '.'"
        )))
    }
}

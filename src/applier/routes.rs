//! Route-based applier: rewrite AllowedIPs and live-sync the interface.
//!
//! The candidate config is written to a temp file first and only renamed
//! over the real config after `wg syncconf` succeeds, so a failed sync
//! leaves both the file and the running interface untouched.

use async_trait::async_trait;
use ipnet::IpNet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use super::{render_prefixes, RuleApplier};
use crate::cmd::{run_checked, CommandRunner};
use crate::error::Error;

pub struct RoutesApplier {
    runner: Arc<dyn CommandRunner>,
    interface: String,
    config_file: PathBuf,
}

impl RoutesApplier {
    pub fn new(runner: Arc<dyn CommandRunner>, interface: &str, config_file: &Path) -> Self {
        Self {
            runner,
            interface: interface.to_string(),
            config_file: config_file.to_path_buf(),
        }
    }
}

#[async_trait]
impl RuleApplier for RoutesApplier {
    async fn apply(&self, prefixes: &[IpNet]) -> Result<(), Error> {
        let content = std::fs::read_to_string(&self.config_file).map_err(|e| {
            Error::Config(format!(
                "cannot read WireGuard config {}: {e}",
                self.config_file.display()
            ))
        })?;

        let line = render_allowed_ips(prefixes);
        let (candidate, replaced) = replace_allowed_ips(&content, &line);
        if !replaced {
            warn!(
                "no AllowedIPs line in {}, appending one",
                self.config_file.display()
            );
        }

        let dir = self.config_file.parent().unwrap_or(Path::new("/etc/wireguard"));

        // The peer-only extract is what wg syncconf accepts; the full
        // candidate replaces the config file once the sync succeeds.
        let mut peer_file = NamedTempFile::new_in(dir)?;
        peer_file.write_all(extract_peer_sections(&candidate).as_bytes())?;
        peer_file.as_file().sync_all()?;

        let mut config_tmp = NamedTempFile::new_in(dir)?;
        config_tmp.write_all(candidate.as_bytes())?;
        config_tmp.as_file().sync_all()?;

        let peer_path = peer_file.path().display().to_string();
        run_checked(
            self.runner.as_ref(),
            "wg",
            &["syncconf", &self.interface, &peer_path],
        )?;

        config_tmp
            .persist(&self.config_file)
            .map_err(|e| Error::Config(format!("failed to persist config: {e}")))?;

        info!(
            "synced {} AllowedIPs prefixes to {}",
            prefixes.len(),
            self.interface
        );
        Ok(())
    }

    fn required_tools(&self) -> &'static [&'static str] {
        &["wg"]
    }

    fn describe(&self) -> &'static str {
        "wireguard routes"
    }
}

/// Render the AllowedIPs line for a prefix list.
pub fn render_allowed_ips(prefixes: &[IpNet]) -> String {
    format!("AllowedIPs = {}", render_prefixes(prefixes).join(", "))
}

/// Replace the first AllowedIPs line with `line`, or append it at EOF when
/// no such line exists. Returns the new content and whether a replacement
/// happened. Indentation of a replaced line is preserved.
pub fn replace_allowed_ips(content: &str, line: &str) -> (String, bool) {
    let mut replaced = false;
    let mut out: Vec<String> = Vec::new();

    for raw in content.lines() {
        if !replaced && raw.trim_start().starts_with("AllowedIPs") {
            let indent: String = raw.chars().take_while(|c| c.is_whitespace()).collect();
            out.push(format!("{indent}{line}"));
            replaced = true;
        } else {
            out.push(raw.to_string());
        }
    }

    if !replaced {
        out.push(line.to_string());
    }
    (out.join("\n") + "\n", replaced)
}

/// Parse the prefixes listed on the first AllowedIPs line of a config.
/// Unparseable items are skipped; a config written by wgsteer never has
/// any.
pub fn parse_allowed_ips(content: &str) -> Vec<IpNet> {
    content
        .lines()
        .find_map(|l| l.trim_start().strip_prefix("AllowedIPs"))
        .and_then(|rest| rest.trim_start().strip_prefix('='))
        .map(|list| {
            list.split(',')
                .filter_map(|item| item.trim().parse::<IpNet>().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Everything from the first `[Peer]` line onward, which is the part
/// `wg syncconf` understands.
pub fn extract_peer_sections(content: &str) -> String {
    let mut out = String::new();
    let mut in_peer = false;
    for line in content.lines() {
        if line.trim() == "[Peer]" {
            in_peer = true;
        }
        if in_peer {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::{CmdOutput, MockCommandRunner};

    const SAMPLE_CONF: &str = "\
[Interface]
PrivateKey = aaa=
Address = 10.8.0.2/32

[Peer]
PublicKey = bbb=
Endpoint = vpn.example.net:51820
AllowedIPs = 0.0.0.0/0
PersistentKeepalive = 25
";

    fn nets(entries: &[&str]) -> Vec<IpNet> {
        entries.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_render_allowed_ips() {
        let line = render_allowed_ips(&nets(&["10.0.0.0/8", "192.168.0.0/16"]));
        assert_eq!(line, "AllowedIPs = 10.0.0.0/8, 192.168.0.0/16");
    }

    #[test]
    fn test_replace_allowed_ips_in_place() {
        let (out, replaced) =
            replace_allowed_ips(SAMPLE_CONF, "AllowedIPs = 203.0.113.0/24");
        assert!(replaced);
        assert!(out.contains("AllowedIPs = 203.0.113.0/24"));
        assert!(!out.contains("0.0.0.0/0"));
        // Rest of the file is untouched.
        assert!(out.contains("PersistentKeepalive = 25"));
        assert!(out.contains("PrivateKey = aaa="));
    }

    #[test]
    fn test_replace_allowed_ips_preserves_indent() {
        let conf = "[Peer]\n  AllowedIPs = 0.0.0.0/0\n";
        let (out, replaced) = replace_allowed_ips(conf, "AllowedIPs = 10.0.0.0/8");
        assert!(replaced);
        assert!(out.contains("  AllowedIPs = 10.0.0.0/8"));
    }

    #[test]
    fn test_replace_allowed_ips_appends_when_absent() {
        let conf = "[Peer]\nPublicKey = bbb=\n";
        let (out, replaced) = replace_allowed_ips(conf, "AllowedIPs = 10.0.0.0/8");
        assert!(!replaced);
        assert!(out.ends_with("AllowedIPs = 10.0.0.0/8\n"));
    }

    #[test]
    fn test_replace_allowed_ips_only_first_occurrence() {
        let conf = "AllowedIPs = 1.1.1.1/32\nAllowedIPs = 2.2.2.2/32\n";
        let (out, _) = replace_allowed_ips(conf, "AllowedIPs = 10.0.0.0/8");
        assert!(out.contains("AllowedIPs = 10.0.0.0/8"));
        assert!(out.contains("AllowedIPs = 2.2.2.2/32"));
    }

    #[test]
    fn test_parse_allowed_ips() {
        let allowed = parse_allowed_ips(SAMPLE_CONF);
        assert_eq!(allowed, nets(&["0.0.0.0/0"]));

        let multi = "AllowedIPs = 10.0.0.0/8, 192.168.0.0/16\n";
        assert_eq!(
            parse_allowed_ips(multi),
            nets(&["10.0.0.0/8", "192.168.0.0/16"])
        );

        assert!(parse_allowed_ips("[Interface]\n").is_empty());
    }

    #[test]
    fn test_extract_peer_sections() {
        let peers = extract_peer_sections(SAMPLE_CONF);
        assert!(peers.starts_with("[Peer]"));
        assert!(peers.contains("PublicKey = bbb="));
        assert!(!peers.contains("PrivateKey"));
    }

    #[test]
    fn test_extract_peer_sections_no_peer() {
        assert!(extract_peer_sections("[Interface]\nAddress = 10.0.0.1/32\n").is_empty());
    }

    #[tokio::test]
    async fn test_apply_success_rewrites_config() {
        let dir = tempfile::tempdir().unwrap();
        let conf_path = dir.path().join("wg1.conf");
        std::fs::write(&conf_path, SAMPLE_CONF).unwrap();

        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|program, args| program == "wg" && args[0] == "syncconf" && args[1] == "wg1")
            .times(1)
            .returning(|_, _| {
                Ok(CmdOutput {
                    success: true,
                    code: Some(0),
                    ..Default::default()
                })
            });

        let applier = RoutesApplier::new(Arc::new(mock), "wg1", &conf_path);
        applier.apply(&nets(&["203.0.113.0/24"])).await.unwrap();

        let written = std::fs::read_to_string(&conf_path).unwrap();
        assert!(written.contains("AllowedIPs = 203.0.113.0/24"));
    }

    #[tokio::test]
    async fn test_apply_failed_sync_keeps_old_config() {
        let dir = tempfile::tempdir().unwrap();
        let conf_path = dir.path().join("wg1.conf");
        std::fs::write(&conf_path, SAMPLE_CONF).unwrap();

        let mut mock = MockCommandRunner::new();
        mock.expect_run().returning(|_, _| {
            Ok(CmdOutput {
                stderr: "Unable to modify interface: Operation not permitted".to_string(),
                success: false,
                code: Some(1),
                ..Default::default()
            })
        });

        let applier = RoutesApplier::new(Arc::new(mock), "wg1", &conf_path);
        let err = applier.apply(&nets(&["203.0.113.0/24"])).await.unwrap_err();
        assert!(matches!(err, Error::Apply { code: 1, .. }));

        // Previous configuration must remain active.
        let written = std::fs::read_to_string(&conf_path).unwrap();
        assert_eq!(written, SAMPLE_CONF);
    }

    #[tokio::test]
    async fn test_apply_missing_config_is_error() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run().times(0);
        let applier = RoutesApplier::new(
            Arc::new(mock),
            "wg1",
            Path::new("/nonexistent/wg1.conf"),
        );
        assert!(applier.apply(&nets(&["10.0.0.0/8"])).await.is_err());
    }
}

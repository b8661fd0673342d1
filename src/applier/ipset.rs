//! ipset/iptables applier.
//!
//! Membership is built in a staging set and moved into place with
//! `ipset swap`, so readers never observe a half-filled set. The iptables
//! rules are checked with `-C` before being added; re-running never
//! duplicates them.

use async_trait::async_trait;
use ipnet::IpNet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{render_prefixes, RuleApplier};
use crate::cmd::{run_checked, run_checked_with_stdin, to_args, CommandRunner};
use crate::error::Error;

const IPTABLES_RULES_FILE: &str = "/etc/iptables/rules.v4";
const IPSET_SAVE_FILE: &str = "/etc/ipset.conf";

pub struct IpsetApplier {
    runner: Arc<dyn CommandRunner>,
    set_name: String,
    wg_interface: String,
    lan_interface: Option<String>,
    persist: bool,
}

impl IpsetApplier {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        set_name: &str,
        wg_interface: &str,
        lan_interface: Option<&str>,
        persist: bool,
    ) -> Self {
        Self {
            runner,
            set_name: set_name.to_string(),
            wg_interface: wg_interface.to_string(),
            lan_interface: lan_interface.map(str::to_string),
            persist,
        }
    }

    fn staging_name(&self) -> String {
        format!("{}_staging", self.set_name)
    }

    /// Fill the staging set and swap it into place. On error the caller
    /// destroys the staging set; the live set is never touched until the
    /// final swap.
    fn build_and_swap(&self, prefixes: &[IpNet]) -> Result<(), Error> {
        let runner = self.runner.as_ref();
        let staging = self.staging_name();

        run_checked(runner, "ipset", &["create", &self.set_name, "hash:net", "-exist"])?;
        run_checked(runner, "ipset", &["create", &staging, "hash:net", "-exist"])?;
        run_checked(runner, "ipset", &["flush", &staging])?;

        let script: String = render_prefixes(prefixes)
            .iter()
            .map(|p| format!("add {staging} {p} -exist\n"))
            .collect();
        run_checked_with_stdin(runner, "ipset", &["restore"], &script)?;
        debug!("staged {} entries in {}", prefixes.len(), staging);

        run_checked(runner, "ipset", &["swap", &staging, &self.set_name])?;
        Ok(())
    }

    /// Add the rule to `chain` unless an identical one already exists.
    fn ensure_rule(&self, chain: &str, rule: &[&str]) -> Result<(), Error> {
        let mut check = vec!["-C", chain];
        check.extend_from_slice(rule);
        let present = self
            .runner
            .run("iptables", &to_args(&check))
            .map(|out| out.success)
            .unwrap_or(false);
        if present {
            debug!("iptables {chain} rule already present");
            return Ok(());
        }

        let mut add = vec!["-A", chain];
        add.extend_from_slice(rule);
        run_checked(self.runner.as_ref(), "iptables", &add)?;
        info!("added iptables {chain} rule for set {}", self.set_name);
        Ok(())
    }

    fn ensure_rules(&self) -> Result<(), Error> {
        // Outbound traffic to a covered destination goes out the tunnel.
        self.ensure_rule(
            "OUTPUT",
            &[
                "-m", "set", "--match-set", &self.set_name, "dst",
                "-o", &self.wg_interface, "-j", "ACCEPT",
            ],
        )?;

        // Routed LAN traffic, when a LAN interface is configured.
        if let Some(lan) = &self.lan_interface {
            self.ensure_rule(
                "FORWARD",
                &[
                    "-i", lan, "-o", &self.wg_interface,
                    "-m", "set", "--match-set", &self.set_name, "dst",
                    "-j", "ACCEPT",
                ],
            )?;
            self.ensure_rule(
                "FORWARD",
                &["-i", &self.wg_interface, "-o", lan, "-j", "ACCEPT"],
            )?;
        }
        Ok(())
    }

    /// Snapshot rules for restore-on-boot. Failures only warn: the live
    /// state is already correct.
    fn persist_state(&self) {
        let runner = self.runner.as_ref();

        match run_checked(runner, "iptables-save", &[]) {
            Ok(out) => {
                if let Err(e) = std::fs::write(IPTABLES_RULES_FILE, out.stdout) {
                    warn!("failed to write {IPTABLES_RULES_FILE}: {e}");
                }
            }
            Err(e) => warn!("iptables-save failed: {e}"),
        }

        match run_checked(runner, "ipset", &["save", &self.set_name]) {
            Ok(out) => {
                if let Err(e) = std::fs::write(IPSET_SAVE_FILE, out.stdout) {
                    warn!("failed to write {IPSET_SAVE_FILE}: {e}");
                }
            }
            Err(e) => warn!("ipset save failed: {e}"),
        }
    }
}

#[async_trait]
impl RuleApplier for IpsetApplier {
    async fn apply(&self, prefixes: &[IpNet]) -> Result<(), Error> {
        let result = self.build_and_swap(prefixes);
        // Best-effort cleanup either way; after a successful swap the
        // staging set holds the previous membership.
        let staging = self.staging_name();
        let _ = self.runner.run("ipset", &to_args(&["destroy", &staging]));
        result?;

        self.ensure_rules()?;

        if self.persist {
            self.persist_state();
        }

        info!(
            "ipset {} now holds {} entries",
            self.set_name,
            prefixes.len()
        );
        Ok(())
    }

    fn required_tools(&self) -> &'static [&'static str] {
        &["ipset", "iptables", "wg"]
    }

    fn describe(&self) -> &'static str {
        "ipset/iptables"
    }
}

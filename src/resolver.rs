//! Range resolver: produces the baseline set of prefixes to protect.
//!
//! The default source is RIPEstat's per-country allocation table. Entries
//! arrive either as CIDRs or as `start-end` address ranges; ranges are
//! expanded to the minimal covering CIDR list. A local file can be used
//! instead for air-gapped or pinned setups.
//!
//! Provider data is noisy, so malformed entries are skipped with a warning.
//! Anything that makes the whole source unusable (network failure, bad
//! payload, zero usable prefixes) is fatal: there is no safe default set.

use futures::stream::{self, StreamExt};
use ipnet::{IpNet, Ipv4Net, Ipv4Subnets};
use reqwest::Client;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::combiner::{self, PrefixSet};
use crate::config::{Config, ProtectMode, RangeSource};
use crate::error::Error;
use crate::lists;

const RIPE_URL: &str = "https://stat.ripe.net/data/country-resource-list/data.json";

/// Concurrency cap when fetching several countries at once.
const MAX_CONCURRENT_FETCHES: usize = 4;

#[derive(Deserialize)]
struct RipeResponse {
    data: RipeData,
}

#[derive(Deserialize)]
struct RipeData {
    resources: RipeResources,
}

#[derive(Deserialize)]
struct RipeResources {
    ipv4: Vec<String>,
}

/// HTTP client wrapper for the range data source.
pub struct Resolver {
    client: Client,
}

impl Resolver {
    pub fn new(timeout_secs: u64) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(format!("wgsteer/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Resolve(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Produce the baseline [`PrefixSet`] per the configured source and
    /// protect mode. Deterministic for a given payload.
    pub async fn resolve(&self, config: &Config) -> Result<PrefixSet, Error> {
        let listed = match &config.source {
            RangeSource::Ripe { countries } => self.fetch_countries(countries).await?,
            RangeSource::File { path } => {
                if !path.exists() {
                    return Err(Error::Resolve(format!(
                        "range file {} not found",
                        path.display()
                    )));
                }
                let set = lists::load_prefix_file(path)?;
                let mut v4 = Vec::new();
                for net in set {
                    match net {
                        IpNet::V4(n) => v4.push(n),
                        IpNet::V6(n) => {
                            warn!("ignoring IPv6 range {} from {}", n, path.display())
                        }
                    }
                }
                v4
            }
        };

        if listed.is_empty() {
            return Err(Error::Resolve(
                "range source yielded no usable prefixes".to_string(),
            ));
        }

        let coarsened: Vec<IpNet> = listed
            .into_iter()
            .map(|n| IpNet::V4(coarsen(n, config.cutoff_prefix)))
            .collect();
        let listed_set = combiner::coalesce(&coarsened);
        info!(
            "resolved {} ranges after /{} coarsening and coalescing",
            listed_set.len(),
            config.cutoff_prefix
        );

        let baseline = match config.protect {
            // Route everything except the listed ranges through the tunnel.
            ProtectMode::Foreign => {
                let full_v4 = Ipv4Net::new(Ipv4Addr::UNSPECIFIED, 0).expect("/0 is valid");
                combiner::subtract(&[IpNet::V4(full_v4)], &listed_set)
            }
            ProtectMode::Listed => listed_set,
        };

        Ok(baseline.into_iter().collect())
    }

    async fn fetch_countries(&self, countries: &[String]) -> Result<Vec<Ipv4Net>, Error> {
        let results: Vec<Result<Vec<Ipv4Net>, Error>> =
            stream::iter(countries.iter().map(|cc| self.fetch_country(cc)))
                .buffer_unordered(MAX_CONCURRENT_FETCHES)
                .collect()
                .await;

        let mut all = Vec::new();
        for result in results {
            all.extend(result?);
        }
        Ok(all)
    }

    /// Fetch the IPv4 allocation list for one country code.
    async fn fetch_country(&self, country: &str) -> Result<Vec<Ipv4Net>, Error> {
        let url = format!("{RIPE_URL}?resource={country}");
        info!("fetching IPv4 ranges for {country}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Resolve(format!("request for {country} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Resolve(format!(
                "range source returned HTTP {} for {country}",
                response.status()
            )));
        }

        let payload: RipeResponse = response
            .json()
            .await
            .map_err(|e| Error::Resolve(format!("bad payload for {country}: {e}")))?;

        let raw = payload.data.resources.ipv4;
        debug!("{country}: {} raw entries", raw.len());

        let mut nets = Vec::new();
        for entry in &raw {
            match normalize_entry(entry) {
                Some(expanded) => nets.extend(expanded),
                None => warn!("{country}: skipping malformed range entry '{entry}'"),
            }
        }

        if nets.is_empty() {
            return Err(Error::Resolve(format!(
                "no usable prefixes in range data for {country}"
            )));
        }
        info!("{country}: {} prefixes after range expansion", nets.len());
        Ok(nets)
    }
}

/// Normalize one provider entry: a CIDR, a bare address, or a
/// `start-end` range expanded to its covering CIDRs.
pub fn normalize_entry(entry: &str) -> Option<Vec<Ipv4Net>> {
    let entry = entry.trim();
    if let Some((start, end)) = entry.split_once('-') {
        let start: Ipv4Addr = start.trim().parse().ok()?;
        let end: Ipv4Addr = end.trim().parse().ok()?;
        if start > end {
            return None;
        }
        return Some(Ipv4Subnets::new(start, end, 0).collect());
    }
    if entry.contains('/') {
        return Some(vec![entry.parse::<Ipv4Net>().ok()?.trunc()]);
    }
    let addr: Ipv4Addr = entry.parse().ok()?;
    Some(vec![Ipv4Net::from(addr)])
}

/// Widen a prefix longer than `cutoff` to the cutoff length, clearing the
/// host bits. Trades precision for a smaller ruleset.
pub fn coarsen(net: Ipv4Net, cutoff: u8) -> Ipv4Net {
    if net.prefix_len() <= cutoff {
        return net;
    }
    match Ipv4Net::new(net.addr(), cutoff) {
        Ok(widened) => widened.trunc(),
        Err(_) => net,
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Range expansion exactly covers the range: the first network
        /// starts at the range start and the last ends at the range end.
        #[test]
        fn prop_range_expansion_covers(a in any::<u32>(), b in any::<u32>()) {
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            let start = Ipv4Addr::from(start);
            let end = Ipv4Addr::from(end);
            let nets = normalize_entry(&format!("{start}-{end}")).unwrap();
            prop_assert!(!nets.is_empty());
            prop_assert_eq!(nets.first().unwrap().network(), start);
            prop_assert_eq!(nets.last().unwrap().broadcast(), end);
        }

        /// Coarsening never lengthens a prefix and keeps the address inside.
        #[test]
        fn prop_coarsen_widens_only(addr in any::<u32>(), len in 0u8..=32, cutoff in 1u8..=32) {
            let net = Ipv4Net::new(Ipv4Addr::from(addr), len).unwrap().trunc();
            let coarse = coarsen(net, cutoff);
            prop_assert!(coarse.prefix_len() <= net.prefix_len().max(cutoff));
            prop_assert!(coarse.contains(&net.addr()));
        }
    }
}

//! Include/exclude list loading.
//!
//! The override lists are plain UTF-8 text, one CIDR or bare IP per line,
//! with `#` comments and blank lines ignored. A missing file is an empty
//! set; a malformed entry aborts the run.

use ipnet::IpNet;
use std::net::IpAddr;
use std::path::Path;
use tracing::debug;

use crate::combiner::PrefixSet;
use crate::error::Error;

/// Load a prefix list file. A missing file degrades to an empty set; any
/// malformed entry is a fatal [`Error::Parse`] naming the file and line.
pub fn load_prefix_file(path: &Path) -> Result<PrefixSet, Error> {
    if !path.exists() {
        debug!("list file {} not found, using empty set", path.display());
        return Ok(PrefixSet::new());
    }
    let content = std::fs::read_to_string(path)?;
    parse_prefixes(&content, &path.display().to_string())
}

/// Parse prefix-list content. `origin` is only used in error messages.
pub fn parse_prefixes(content: &str, origin: &str) -> Result<PrefixSet, Error> {
    let mut set = PrefixSet::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let net = parse_entry(line).ok_or_else(|| Error::Parse {
            file: origin.to_string(),
            line: idx + 1,
            entry: line.to_string(),
        })?;
        set.insert(net);
    }
    Ok(set)
}

/// Parse one list entry: a CIDR, or a bare address that becomes a host
/// prefix (/32 or /128). Host bits are cleared.
pub fn parse_entry(entry: &str) -> Option<IpNet> {
    let net = if entry.contains('/') {
        entry.parse::<IpNet>().ok()?
    } else {
        IpNet::from(entry.parse::<IpAddr>().ok()?)
    };
    Some(net.trunc())
}

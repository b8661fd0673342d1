//! Prefix-set algebra: canonicalization, coalescing and subtraction.
//!
//! The final ruleset is `(resolved ∪ include) − exclude`. Excludes always
//! win: a prefix that is partially covered by an exclude is split into the
//! sub-prefixes covering exactly the remainder.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::collections::BTreeSet;

/// Deduplicated, deterministically ordered set of canonical prefixes.
pub type PrefixSet = BTreeSet<IpNet>;

/// Compute the final ruleset from the three input sets.
///
/// The union of `resolved` and `include` is coalesced first, every exclude
/// is subtracted with prefix splitting, and the survivors are coalesced
/// again. The result never intersects `exclude` and always covers
/// `include − exclude`.
pub fn combine(resolved: &PrefixSet, include: &PrefixSet, exclude: &PrefixSet) -> Vec<IpNet> {
    let union: Vec<IpNet> = resolved.union(include).map(|n| n.trunc()).collect();
    let excludes: Vec<IpNet> = exclude.iter().map(|n| n.trunc()).collect();

    let kept = subtract(&coalesce(&union), &excludes);
    coalesce(&kept)
}

/// Merge adjacent and overlapping prefixes into the minimal covering list.
pub fn coalesce(nets: &[IpNet]) -> Vec<IpNet> {
    let v4: Vec<Ipv4Net> = nets
        .iter()
        .filter_map(|n| match n {
            IpNet::V4(v4) => Some(v4.trunc()),
            _ => None,
        })
        .collect();
    let v6: Vec<Ipv6Net> = nets
        .iter()
        .filter_map(|n| match n {
            IpNet::V6(v6) => Some(v6.trunc()),
            _ => None,
        })
        .collect();

    let mut out: Vec<IpNet> = Ipv4Net::aggregate(&v4).into_iter().map(IpNet::V4).collect();
    out.extend(Ipv6Net::aggregate(&v6).into_iter().map(IpNet::V6));
    out
}

/// Remove every excluded range from `nets`, splitting prefixes that are
/// only partially covered.
pub fn subtract(nets: &[IpNet], excludes: &[IpNet]) -> Vec<IpNet> {
    let mut out = Vec::new();
    for net in nets {
        carve(net.trunc(), excludes, &mut out);
    }
    out
}

/// Recursively carve the excluded ranges out of one prefix.
///
/// CIDR prefixes either nest or are disjoint, so an overlap means one side
/// contains the other; a partial overlap is resolved by splitting `net`
/// into its two halves and recursing.
fn carve(net: IpNet, excludes: &[IpNet], out: &mut Vec<IpNet>) {
    if excludes.iter().any(|e| covers(e, &net)) {
        return;
    }
    if !excludes.iter().any(|e| covers(&net, e)) {
        out.push(net);
        return;
    }
    // An exclude is a strict sub-range of net, so net is wider than the
    // maximum prefix length and can be halved.
    match net.subnets(net.prefix_len() + 1) {
        Ok(halves) => {
            for half in halves {
                carve(half, excludes, out);
            }
        }
        Err(_) => out.push(net),
    }
}

/// True if `outer` fully contains `inner` (same address family only).
pub fn covers(outer: &IpNet, inner: &IpNet) -> bool {
    match (outer, inner) {
        (IpNet::V4(o), IpNet::V4(i)) => o.contains(i),
        (IpNet::V6(o), IpNet::V6(i)) => o.contains(i),
        _ => false,
    }
}

/// True if any prefix in `nets` contains the given prefix.
pub fn set_covers(nets: &PrefixSet, target: &IpNet) -> bool {
    nets.iter().any(|n| covers(n, target))
}

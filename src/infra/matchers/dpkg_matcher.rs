//! Worked matcher example (§6.3, S4): matches dpkg-sourced packages against
//! vulnerabilities scoped to the same distribution, using dpkg's own version
//! comparison algorithm rather than semver (dpkg versions routinely look
//! like `1:2.4.47-2+deb11u1`, which `semver` cannot parse at all).

use crate::app::matcher::traits::MatcherPlugin;
use crate::app::store::{MatchConstraint, MatchQueryRecord};
use crate::domain::Vulnerability;

/// Splits a dpkg version into its `epoch:upstream-revision` parts (Debian
/// Policy §5.6.12).
fn split_epoch(version: &str) -> (u64, &str) {
    match version.split_once(':') {
        Some((epoch, rest)) => (epoch.parse().unwrap_or(0), rest),
        None => (0, version),
    }
}

/// Compares two dpkg version strings per the algorithm `dpkg --compare-versions`
/// uses: alternating non-digit/digit runs, where non-digit runs compare by
/// `~` sorting before everything (including the empty string) and digit runs
/// compare numerically.
fn compare_fragment(a: &str, b: &str) -> std::cmp::Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        // Non-digit run.
        let (mut av, mut bv) = (Vec::new(), Vec::new());
        while a.peek().is_some_and(|c| !c.is_ascii_digit()) {
            av.push(a.next().unwrap());
        }
        while b.peek().is_some_and(|c| !c.is_ascii_digit()) {
            bv.push(b.next().unwrap());
        }
        let ord = compare_non_digit_run(&av, &bv);
        if ord != std::cmp::Ordering::Equal {
            return ord;
        }

        // Digit run.
        let mut an = String::new();
        let mut bn = String::new();
        while a.peek().is_some_and(|c| c.is_ascii_digit()) {
            an.push(a.next().unwrap());
        }
        while b.peek().is_some_and(|c| c.is_ascii_digit()) {
            bn.push(b.next().unwrap());
        }
        let an: u64 = an.parse().unwrap_or(0);
        let bn: u64 = bn.parse().unwrap_or(0);
        let ord = an.cmp(&bn);
        if ord != std::cmp::Ordering::Equal {
            return ord;
        }

        if a.peek().is_none() && b.peek().is_none() {
            return std::cmp::Ordering::Equal;
        }
    }
}

fn char_rank(c: Option<char>) -> i32 {
    match c {
        None => -1,
        Some('~') => -2,
        Some(c) if c.is_ascii_alphabetic() => c as i32 + 256,
        Some(c) => c as i32,
    }
}

fn compare_non_digit_run(a: &[char], b: &[char]) -> std::cmp::Ordering {
    let max = a.len().max(b.len());
    for i in 0..max {
        let ord = char_rank(a.get(i).copied()).cmp(&char_rank(b.get(i).copied()));
        if ord != std::cmp::Ordering::Equal {
            return ord;
        }
    }
    std::cmp::Ordering::Equal
}

fn dpkg_version_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    let (epoch_a, rest_a) = split_epoch(a);
    let (epoch_b, rest_b) = split_epoch(b);
    let epoch_ord = epoch_a.cmp(&epoch_b);
    if epoch_ord != std::cmp::Ordering::Equal {
        return epoch_ord;
    }

    let (upstream_a, revision_a) = rest_a.rsplit_once('-').unwrap_or((rest_a, "0"));
    let (upstream_b, revision_b) = rest_b.rsplit_once('-').unwrap_or((rest_b, "0"));

    let upstream_ord = compare_fragment(upstream_a, upstream_b);
    if upstream_ord != std::cmp::Ordering::Equal {
        return upstream_ord;
    }
    compare_fragment(revision_a, revision_b)
}

pub struct DpkgMatcher;

#[async_trait::async_trait]
impl MatcherPlugin for DpkgMatcher {
    fn name(&self) -> String {
        "dpkg".to_string()
    }

    fn filter(&self, record: &MatchQueryRecord) -> bool {
        record.distribution_did.as_deref() == Some("debian")
    }

    fn query(&self) -> Vec<MatchConstraint> {
        vec![MatchConstraint::PackageName, MatchConstraint::DistributionDid]
    }

    async fn vulnerable(&self, record: &MatchQueryRecord, vuln: &Vulnerability) -> bool {
        match &vuln.fixed_in_version {
            Some(fixed) => dpkg_version_cmp(&record.package_version, fixed) == std::cmp::Ordering::Less,
            None => true,
        }
    }
}

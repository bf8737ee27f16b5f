//! parallel matcher fan-out producing a [`VulnerabilityReport`].

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::app::error::{Classify, ErrorKind};
use crate::app::matcher::traits::{normalize, MatcherError, MatcherPlugin, VersionKind};
use crate::app::store::{MatchOptions, MatchQueryRecord, MatchResults, Store};
use crate::domain::{IndexReport, VulnerabilityReport};

const REMOTE_MATCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Joined failure of a legacy [`Matcher::match_`] run: every matcher that
/// errored, not just the first (§4.5: "legacy Match runs all matchers to
/// completion and joins errors").
#[derive(Error, Debug)]
#[error("{} matcher(s) failed: {}", .0.len(), .0.iter().map(|(n, e)| format!("{n}: {e}")).collect::<Vec<_>>().join("; "))]
pub struct JoinedMatcherError(pub Vec<(String, MatcherError)>);

impl Classify for JoinedMatcherError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Transient
    }
}

/// Builds the candidate record set the matchers see, one per package in the
/// report, carrying the associated distribution/repository if any.
fn build_records(report: &IndexReport) -> Vec<MatchQueryRecord> {
    report
        .packages
        .values()
        .map(|package| {
            let distribution = report.package_distribution.get(&package.id());
            let repository = report.package_repository.get(&package.id());
            MatchQueryRecord {
                package_id: package.id(),
                package_name: package.name.clone(),
                package_module: package.module.clone(),
                package_version: package.version.clone(),
                distribution_did: distribution.map(|d| d.did.clone()),
                distribution_version_id: distribution.map(|d| d.version_id.clone()),
                repository_name: repository.map(|r| r.name.clone()),
            }
        })
        .collect()
}

fn merge_into(report: &mut VulnerabilityReport, results: MatchResults) {
    for (package_id, vulns) in results {
        for vuln in vulns {
            report.add_finding(package_id.clone(), vuln);
        }
    }
}

/// One matcher's steps 1-3 against the pre-built record set. A free
/// function (rather than a `Matcher` method) so spawned tasks only need to
/// clone a `store` handle and a matcher, not the whole engine.
async fn run_one(
    store: &dyn Store,
    matcher: &dyn MatcherPlugin,
    records: &[MatchQueryRecord],
) -> Result<MatchResults, MatcherError> {
    let filtered: Vec<MatchQueryRecord> = records
        .iter()
        .filter(|r| normalize(&r.package_version).kind != VersionKind::Unmatchable)
        .filter(|r| matcher.filter(r))
        .cloned()
        .collect();

    if filtered.is_empty() {
        return Ok(MatchResults::new());
    }

    if let Some(remote) = matcher.as_remote_matcher() {
        return match tokio::time::timeout(REMOTE_MATCH_TIMEOUT, remote.remote_match(&filtered)).await {
            Ok(Ok(results)) => Ok(results),
            Ok(Err(e)) => {
                warn!(matcher = %matcher.name(), error = %e, "remote matcher failed, using empty result");
                Ok(MatchResults::new())
            }
            Err(_) => {
                warn!(matcher = %matcher.name(), "remote matcher timed out, using empty result");
                Ok(MatchResults::new())
            }
        };
    }

    let constraints = matcher.query();
    let version_filter = matcher.as_version_filter();
    let opts = MatchOptions {
        version_filtering: version_filter.is_some(),
    };
    let candidates = store.get(&filtered, &constraints, &opts).await;

    let authoritative = version_filter.is_some_and(|vf| vf.version_authoritative());
    if authoritative {
        return Ok(candidates);
    }

    let mut results = MatchResults::new();
    for (package_id, vulns) in candidates {
        let Some(record) = filtered.iter().find(|r| r.package_id == package_id) else {
            continue;
        };
        let mut kept = Vec::new();
        for vuln in vulns {
            if matcher.vulnerable(record, &vuln).await {
                kept.push(vuln);
            }
        }
        if !kept.is_empty() {
            results.insert(package_id, kept);
        }
    }
    Ok(results)
}

pub struct Matcher {
    matchers: Vec<Arc<dyn MatcherPlugin>>,
    store: Arc<dyn Store>,
}

impl Matcher {
    pub fn new(matchers: Vec<Arc<dyn MatcherPlugin>>, store: Arc<dyn Store>) -> Self {
        Self { matchers, store }
    }

    /// Legacy entry point: every matcher runs to completion, bounded by the
    /// number of logical CPUs; any matcher error aborts the whole call with
    /// a joined error rather than a partial report.
    pub async fn match_(&self, report: &IndexReport) -> Result<VulnerabilityReport, JoinedMatcherError> {
        let records = build_records(report);
        let permits = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut set = JoinSet::new();
        for matcher in self.matchers.clone() {
            let semaphore = semaphore.clone();
            let records = records.clone();
            let store = self.store.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let name = matcher.name();
                let result = run_one(store.as_ref(), matcher.as_ref(), &records).await;
                (name, result)
            });
        }

        let mut report_out = VulnerabilityReport::new();
        let mut errors = Vec::new();
        while let Some(joined) = set.join_next().await {
            let (name, result) = joined.expect("matcher task panicked");
            match result {
                Ok(results) => merge_into(&mut report_out, results),
                Err(e) => errors.push((name, e)),
            }
        }

        if errors.is_empty() {
            Ok(report_out)
        } else {
            Err(JoinedMatcherError(errors))
        }
    }

    /// `EnrichedMatch` entry point: errgroup semantics — the first matcher
    /// error cancels the rest of the fan-out — then attaches enrichments,
    /// swallowing enricher errors with a log.
    pub async fn enriched_match(
        &self,
        ctx: CancellationToken,
        report: &IndexReport,
        enrichers: &[Arc<dyn crate::app::enrich::Enricher>],
    ) -> Result<VulnerabilityReport, MatcherError> {
        let records = build_records(report);
        let permits = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut set = JoinSet::new();
        for matcher in self.matchers.clone() {
            let semaphore = semaphore.clone();
            let records = records.clone();
            let store = self.store.clone();
            let ctx = ctx.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                if ctx.is_cancelled() {
                    return Ok(MatchResults::new());
                }
                let result = run_one(store.as_ref(), matcher.as_ref(), &records).await;
                if result.is_err() {
                    ctx.cancel();
                }
                result
            });
        }

        let mut report_out = VulnerabilityReport::new();
        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            match joined.expect("matcher task panicked") {
                Ok(results) => merge_into(&mut report_out, results),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(_) => {}
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        for enricher in enrichers {
            match enricher.enrich(ctx.clone(), &report_out).await {
                Ok(records) if !records.is_empty() => {
                    report_out.enrichments.insert(enricher.name(), records);
                }
                Ok(_) => {}
                Err(e) => warn!(enricher = %enricher.name(), error = %e, "enrichment failed, skipping"),
            }
        }

        Ok(report_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::store::MatchConstraint;
    use crate::domain::{Digest, Package, PackageKind, Vulnerability};

    struct AlwaysVulnerable;

    #[async_trait::async_trait]
    impl MatcherPlugin for AlwaysVulnerable {
        fn name(&self) -> String {
            "always-vulnerable".to_string()
        }

        fn filter(&self, _record: &MatchQueryRecord) -> bool {
            true
        }

        fn query(&self) -> Vec<MatchConstraint> {
            vec![MatchConstraint::PackageName]
        }

        async fn vulnerable(&self, _record: &MatchQueryRecord, _vuln: &Vulnerability) -> bool {
            true
        }
    }

    fn sample_package() -> Package {
        Package::new(
            "openssl",
            "1.1.1",
            PackageKind::Binary,
            "amd64",
            None,
            "dpkg",
            None,
        )
    }

    #[test]
    fn normalize_flags_unparsable_versions() {
        assert_eq!(normalize("1.2.3").kind, VersionKind::Valid);
        assert_eq!(normalize("not-a-version").kind, VersionKind::Unmatchable);
    }

    #[test]
    fn build_records_carries_package_identity() {
        let mut report = IndexReport::new(Digest::new("sha256:deadbeef"));
        let package = sample_package();
        report.packages.insert(package.id(), package.clone());
        let records = build_records(&report);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].package_name, "openssl");
    }
}

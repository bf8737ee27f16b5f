//! Reference adapter for `app::store::Store`.
//!
//! Generalizes the teacher's `app::document_database::DocumentDatabase`
//! (a single `RwLock<HashMap<String, Document>>`) to the full set of
//! indexer/updater tables the spec names. Every multi-row mutation takes
//! the write lock once and performs all inserts before releasing it, which
//! is how "operations must be serializable" and "a single transaction" are
//! satisfied without a real RDBMS — the relational schema itself is
//! explicitly out of scope; this is a drop-in reference implementation
//! of the *contract*.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::app::store::{
    MatchConstraint, MatchOptions, MatchQueryRecord, MatchResults, ParsedVulnerabilities, Store, StoreError,
};
use crate::domain::update_operation::Fingerprint;
use crate::domain::{
    Digest, Distribution, IndexReport, Package, PackageId, Repository, ScannerMeta, UpdateKind, UpdateOperation,
    Vulnerability, VulnerabilityId,
};

type LayerScannerKey = (Digest, ScannerMeta);

#[derive(Default)]
struct StoreState {
    packages: HashMap<PackageId, Package>,
    layer_scanner_packages: HashMap<LayerScannerKey, Vec<PackageId>>,

    distributions: HashMap<[u8; 32], Distribution>,
    layer_scanner_distributions: HashMap<LayerScannerKey, Vec<[u8; 32]>>,

    repositories: HashMap<[u8; 32], Repository>,
    layer_scanner_repositories: HashMap<LayerScannerKey, Vec<[u8; 32]>>,

    attested: HashSet<LayerScannerKey>,
    manifest_scanners: HashMap<Digest, HashSet<ScannerMeta>>,
    reports: HashMap<Digest, IndexReport>,

    operations: HashMap<Uuid, UpdateOperation>,
    operation_vulnerabilities: HashMap<Uuid, Vec<VulnerabilityId>>,
    vulnerabilities: HashMap<VulnerabilityId, Vulnerability>,
    operation_enrichments: HashMap<Uuid, Vec<crate::domain::EnrichmentRecord>>,

    latest_vulnerability_op: HashMap<String, Uuid>,
    latest_enrichment_op: HashMap<String, Uuid>,
}

/// In-memory reference implementation of [`Store`]. Good enough to exercise
/// the whole indexer -> matcher path in tests; a production deployment
/// swaps this for a real relational adapter behind the same trait.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn index_artifacts<T, K>(
    attested: &mut HashSet<LayerScannerKey>,
    table: &mut HashMap<K, T>,
    by_layer: &mut HashMap<LayerScannerKey, Vec<K>>,
    artifacts: Vec<T>,
    layer: &Digest,
    scanner: &ScannerMeta,
    id_of: impl Fn(&T) -> K,
) where
    K: std::hash::Hash + Eq + Clone,
{
    let key = (layer.clone(), scanner.clone());
    let mut ids = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let id = id_of(&artifact);
        table.entry(id.clone()).or_insert(artifact);
        ids.push(id);
    }
    by_layer.entry(key.clone()).or_default().extend(ids);
    attested.insert(key);
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn manifest_scanned(&self, hash: &Digest, scanners: &[ScannerMeta]) -> bool {
        let state = self.state.read().await;
        match state.manifest_scanners.get(hash) {
            Some(attested) => scanners.iter().all(|s| attested.contains(s)),
            None => false,
        }
    }

    async fn layer_scanned(&self, layer: &Digest, scanner: &ScannerMeta) -> bool {
        let state = self.state.read().await;
        state.attested.contains(&(layer.clone(), scanner.clone()))
    }

    async fn index_packages(&self, artifacts: Vec<Package>, layer: &Digest, scanner: &ScannerMeta) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        index_artifacts(
            &mut state.attested,
            &mut state.packages,
            &mut state.layer_scanner_packages,
            artifacts,
            layer,
            scanner,
            Package::id,
        );
        Ok(())
    }

    async fn index_distributions(
        &self,
        artifacts: Vec<Distribution>,
        layer: &Digest,
        scanner: &ScannerMeta,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        index_artifacts(
            &mut state.attested,
            &mut state.distributions,
            &mut state.layer_scanner_distributions,
            artifacts,
            layer,
            scanner,
            Distribution::id,
        );
        Ok(())
    }

    async fn index_repositories(
        &self,
        artifacts: Vec<Repository>,
        layer: &Digest,
        scanner: &ScannerMeta,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        index_artifacts(
            &mut state.attested,
            &mut state.repositories,
            &mut state.layer_scanner_repositories,
            artifacts,
            layer,
            scanner,
            Repository::id,
        );
        Ok(())
    }

    async fn packages_by_layer(&self, layer: &Digest, scanners: &[ScannerMeta]) -> Vec<Package> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for scanner in scanners {
            let key = (layer.clone(), scanner.clone());
            if let Some(ids) = state.layer_scanner_packages.get(&key) {
                for id in ids {
                    if seen.insert(id.clone()) {
                        if let Some(p) = state.packages.get(id) {
                            out.push(p.clone());
                        }
                    }
                }
            }
        }
        out
    }

    async fn distributions_by_layer(&self, layer: &Digest, scanners: &[ScannerMeta]) -> Vec<Distribution> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for scanner in scanners {
            let key = (layer.clone(), scanner.clone());
            if let Some(ids) = state.layer_scanner_distributions.get(&key) {
                for id in ids {
                    if seen.insert(*id) {
                        if let Some(d) = state.distributions.get(id) {
                            out.push(d.clone());
                        }
                    }
                }
            }
        }
        out
    }

    async fn repositories_by_layer(&self, layer: &Digest, scanners: &[ScannerMeta]) -> Vec<Repository> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for scanner in scanners {
            let key = (layer.clone(), scanner.clone());
            if let Some(ids) = state.layer_scanner_repositories.get(&key) {
                for id in ids {
                    if seen.insert(*id) {
                        if let Some(r) = state.repositories.get(id) {
                            out.push(r.clone());
                        }
                    }
                }
            }
        }
        out
    }

    async fn scan_report(&self, manifest: &Digest) -> Result<Option<IndexReport>, StoreError> {
        Ok(self.state.read().await.reports.get(manifest).cloned())
    }

    async fn set_scan_report(&self, report: IndexReport) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.reports.insert(report.manifest_hash.clone(), report);
        Ok(())
    }

    async fn set_scan_finished(&self, report: IndexReport, scanners: &[ScannerMeta]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let hash = report.manifest_hash.clone();
        state
            .manifest_scanners
            .entry(hash.clone())
            .or_default()
            .extend(scanners.iter().cloned());
        state.reports.insert(hash, report);
        Ok(())
    }

    async fn update_vulnerabilities(
        &self,
        reference: Uuid,
        updater: &str,
        fingerprint: Fingerprint,
        parsed: ParsedVulnerabilities,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.operations.contains_key(&reference) {
            return Err(StoreError::DuplicateRef(reference));
        }

        let op = UpdateOperation::new(updater.to_string(), fingerprint, UpdateKind::Vulnerability);
        let op = UpdateOperation { reference, ..op };

        let mut ids = Vec::with_capacity(parsed.vulnerabilities.len());
        for vuln in parsed.vulnerabilities {
            let id = vuln.id();
            state.vulnerabilities.entry(id.clone()).or_insert(vuln);
            ids.push(id);
        }

        state.operation_vulnerabilities.insert(reference, ids);
        state.operations.insert(reference, op);
        state.latest_vulnerability_op.insert(updater.to_string(), reference);
        Ok(())
    }

    async fn update_enrichments(
        &self,
        reference: Uuid,
        updater: &str,
        kind: UpdateKind,
        fingerprint: Fingerprint,
        records: Vec<crate::domain::EnrichmentRecord>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.operations.contains_key(&reference) {
            return Err(StoreError::DuplicateRef(reference));
        }

        let op = UpdateOperation::new(updater.to_string(), fingerprint, kind);
        let op = UpdateOperation { reference, ..op };

        state.operation_enrichments.insert(reference, records);
        state.operations.insert(reference, op);
        state.latest_enrichment_op.insert(updater.to_string(), reference);
        Ok(())
    }

    async fn get_latest_update_operations(&self) -> Vec<UpdateOperation> {
        let state = self.state.read().await;
        state
            .latest_vulnerability_op
            .values()
            .chain(state.latest_enrichment_op.values())
            .filter_map(|reference| state.operations.get(reference).cloned())
            .collect()
    }

    async fn get(&self, records: &[MatchQueryRecord], constraints: &[MatchConstraint], opts: &MatchOptions) -> MatchResults {
        let state = self.state.read().await;
        let latest_refs: HashSet<Uuid> = state.latest_vulnerability_op.values().cloned().collect();
        let candidate_vulns: Vec<&Vulnerability> = state
            .operation_vulnerabilities
            .iter()
            .filter(|(reference, _)| latest_refs.contains(*reference))
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| state.vulnerabilities.get(id))
            .collect();

        let mut results = MatchResults::new();
        for record in records {
            let mut matches: Vec<Vulnerability> = candidate_vulns
                .iter()
                .filter(|v| equi_join(record, v, constraints))
                .map(|v| (*v).clone())
                .collect();

            if opts.version_filtering {
                matches.retain(|v| version_in_range(&record.package_version, v));
            }

            if !matches.is_empty() {
                results.insert(record.package_id.clone(), matches);
            }
        }
        results
    }
}

fn equi_join(record: &MatchQueryRecord, vuln: &Vulnerability, constraints: &[MatchConstraint]) -> bool {
    if vuln.affected_package_name != record.package_name {
        return false;
    }
    for constraint in constraints {
        let matches = match constraint {
            MatchConstraint::PackageName => vuln.affected_package_name == record.package_name,
            MatchConstraint::PackageModule => true,
            MatchConstraint::DistributionDid => match (&vuln.affected_distribution, &record.distribution_did) {
                (Some(d), Some(did)) => &d.did == did,
                (None, _) => true,
                _ => false,
            },
            MatchConstraint::DistributionVersionId => {
                match (&vuln.affected_distribution, &record.distribution_version_id) {
                    (Some(d), Some(vid)) => &d.version_id == vid,
                    (None, _) => true,
                    _ => false,
                }
            }
            MatchConstraint::RepositoryName => match (&vuln.affected_repository, &record.repository_name) {
                (Some(r), Some(name)) => &r.name == name,
                (None, _) => true,
                _ => false,
            },
        };
        if !matches {
            return false;
        }
    }
    true
}

/// Best-effort db-side version filtering for the `VersionFilter` capability
/// (§4.5 step 3). Compares semver-parseable versions against `fixed_in`;
/// falls through to "vulnerable" for anything that cannot be parsed, leaving
/// the final call to the matcher's own `Vulnerable()` unless authoritative.
fn version_in_range(installed: &str, vuln: &Vulnerability) -> bool {
    let Some(fixed_in) = &vuln.fixed_in_version else {
        return true;
    };
    match (semver::Version::parse(installed), semver::Version::parse(fixed_in)) {
        (Ok(installed), Ok(fixed_in)) => installed < fixed_in,
        _ => true,
    }
}

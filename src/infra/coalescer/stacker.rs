//! The canonical coalescer: "stacker" semantics. Computes, for each
//! package observed in any layer, the earliest layer digest it first
//! appeared in; a package survives into the final set iff it is still
//! present in the final layer. Iterates layers in manifest order (`&[Layer]`,
//! not a `HashSet`) — this is why `domain::layer::Layer` carries no
//! back-reference collection: coalescing order matters.

use crate::app::coalesce::{CoalesceError, Coalescer, PartialIndexReport};
use crate::app::store::Store;
use crate::domain::{Distribution, Layer, PackageId};

pub struct StackerCoalescer {
    scanners: Vec<crate::domain::ScannerMeta>,
}

impl StackerCoalescer {
    pub fn new(scanners: impl IntoIterator<Item = crate::domain::ScannerMeta>) -> Self {
        Self {
            scanners: scanners.into_iter().collect(),
        }
    }
}

#[async_trait::async_trait]
impl Coalescer for StackerCoalescer {
    async fn coalesce(&self, layers: &[Layer], store: &dyn Store) -> Result<PartialIndexReport, CoalesceError> {
        let mut report = PartialIndexReport::default();
        let mut present_in_final: std::collections::HashSet<PackageId> = std::collections::HashSet::new();

        for (index, layer) in layers.iter().enumerate() {
            let packages = store.packages_by_layer(layer.digest(), &self.scanners).await;
            let distributions = store.distributions_by_layer(layer.digest(), &self.scanners).await;
            let repositories = store.repositories_by_layer(layer.digest(), &self.scanners).await;

            let latest_distribution: Option<&Distribution> = distributions.iter().find(|d| !d.is_empty());

            let is_final_layer = index == layers.len() - 1;
            let mut ids_in_this_layer = std::collections::HashSet::new();

            for package in packages {
                let id = package.id();
                ids_in_this_layer.insert(id.clone());

                report
                    .package_introduced_in
                    .entry(id.clone())
                    .or_insert_with(|| layer.digest().clone());

                if let Some(dist) = latest_distribution {
                    if !dist.is_empty() {
                        report.package_distribution.insert(id.clone(), dist.clone());
                    }
                }

                if let Some(repo) = repositories.first() {
                    report.package_repository.insert(id.clone(), repo.clone());
                }

                report.packages.insert(id, package);
            }

            if is_final_layer {
                present_in_final = ids_in_this_layer;
            }
        }

        report.packages.retain(|id, _| present_in_final.contains(id));
        report.package_introduced_in.retain(|id, _| present_in_final.contains(id));
        report.package_distribution.retain(|id, _| present_in_final.contains(id));
        report.package_repository.retain(|id, _| present_in_final.contains(id));

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::store::StoreError;
    use crate::domain::{Digest, Package, PackageKind, Repository, ScannerKind, ScannerMeta};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        packages: Mutex<HashMap<Digest, Vec<Package>>>,
        distributions: Mutex<HashMap<Digest, Vec<Distribution>>>,
    }

    #[async_trait::async_trait]
    impl Store for FakeStore {
        async fn manifest_scanned(&self, _hash: &Digest, _scanners: &[ScannerMeta]) -> bool {
            false
        }
        async fn layer_scanned(&self, _layer: &Digest, _scanner: &ScannerMeta) -> bool {
            false
        }
        async fn index_packages(&self, _a: Vec<Package>, _l: &Digest, _s: &ScannerMeta) -> Result<(), StoreError> {
            Ok(())
        }
        async fn index_distributions(&self, _a: Vec<Distribution>, _l: &Digest, _s: &ScannerMeta) -> Result<(), StoreError> {
            Ok(())
        }
        async fn index_repositories(&self, _a: Vec<Repository>, _l: &Digest, _s: &ScannerMeta) -> Result<(), StoreError> {
            Ok(())
        }
        async fn packages_by_layer(&self, layer: &Digest, _scanners: &[ScannerMeta]) -> Vec<Package> {
            self.packages.lock().unwrap().get(layer).cloned().unwrap_or_default()
        }
        async fn distributions_by_layer(&self, layer: &Digest, _scanners: &[ScannerMeta]) -> Vec<Distribution> {
            self.distributions.lock().unwrap().get(layer).cloned().unwrap_or_default()
        }
        async fn repositories_by_layer(&self, _layer: &Digest, _scanners: &[ScannerMeta]) -> Vec<Repository> {
            vec![]
        }
        async fn scan_report(&self, _m: &Digest) -> Result<Option<crate::domain::IndexReport>, StoreError> {
            Ok(None)
        }
        async fn set_scan_report(&self, _r: crate::domain::IndexReport) -> Result<(), StoreError> {
            Ok(())
        }
        async fn set_scan_finished(&self, _r: crate::domain::IndexReport, _s: &[ScannerMeta]) -> Result<(), StoreError> {
            Ok(())
        }
        async fn update_vulnerabilities(
            &self,
            _reference: uuid::Uuid,
            _updater: &str,
            _fingerprint: crate::domain::update_operation::Fingerprint,
            _parsed: crate::app::store::ParsedVulnerabilities,
        ) -> Result<(), StoreError> {
            Ok(())
        }
        async fn update_enrichments(
            &self,
            _reference: uuid::Uuid,
            _updater: &str,
            _kind: crate::domain::UpdateKind,
            _fingerprint: crate::domain::update_operation::Fingerprint,
            _records: Vec<crate::domain::EnrichmentRecord>,
        ) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_latest_update_operations(&self) -> Vec<crate::domain::UpdateOperation> {
            vec![]
        }
        async fn get(
            &self,
            _records: &[crate::app::store::MatchQueryRecord],
            _constraints: &[crate::app::store::MatchConstraint],
            _opts: &crate::app::store::MatchOptions,
        ) -> crate::app::store::MatchResults {
            Default::default()
        }
    }

    fn pkg(name: &str) -> Package {
        Package::new(name, "1.0", PackageKind::Binary, "amd64", None, "dpkg", None)
    }

    fn dist(did: &str) -> Distribution {
        Distribution {
            did: did.to_string(),
            name: did.to_string(),
            version: "11".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn package_removed_in_later_layer_is_absent_from_final() {
        let store = FakeStore::default();
        let a = Digest::new("sha256:a");
        let b = Digest::new("sha256:b");
        store.packages.lock().unwrap().insert(a.clone(), vec![pkg("P")]);
        store.packages.lock().unwrap().insert(b.clone(), vec![]);

        let coalescer = StackerCoalescer::new(vec![ScannerMeta::new("dpkg", "1.0", ScannerKind::Package)]);
        let layers = vec![Layer::new(a, 0), Layer::new(b, 1)];

        let report = coalescer.coalesce(&layers, &store).await.unwrap();

        assert!(report.packages.is_empty());
    }

    #[tokio::test]
    async fn later_distribution_wins_and_introduced_in_is_earliest_layer() {
        let store = FakeStore::default();
        let a = Digest::new("sha256:a");
        let b = Digest::new("sha256:b");
        store.packages.lock().unwrap().insert(a.clone(), vec![pkg("P")]);
        store.packages.lock().unwrap().insert(b.clone(), vec![pkg("P")]);
        store.distributions.lock().unwrap().insert(a.clone(), vec![dist("debian")]);
        store.distributions.lock().unwrap().insert(b.clone(), vec![dist("ubuntu")]);

        let coalescer = StackerCoalescer::new(vec![ScannerMeta::new("dpkg", "1.0", ScannerKind::Package)]);
        let layers = vec![Layer::new(a.clone(), 0), Layer::new(b, 1)];

        let report = coalescer.coalesce(&layers, &store).await.unwrap();
        let id = pkg("P").id();

        assert_eq!(report.package_introduced_in.get(&id), Some(&a));
        assert_eq!(report.package_distribution.get(&id).map(|d| d.did.as_str()), Some("ubuntu"));
    }
}

mod common;
mod setup;

use std::sync::Arc;

use chrono::Utc;
use clairctl::app::lock::Lock;
use clairctl::app::matcher::Matcher;
use clairctl::app::store::Store;
use clairctl::app::updater::{ConfigBlob, UpdaterPipeline};
use clairctl::domain::update_operation::Fingerprint;
use clairctl::domain::{ArchOp, IndexReport, Package, PackageKind, Vulnerability};
use clairctl::infra::{InMemoryLock, InMemoryStore};
use tokio_util::sync::CancellationToken;

use common::{
    debian_layer_fs, dpkg_ecosystem, layer_ref, try_lock_both, AuthoritativeStoreMatcher, FakeLayerSource,
    SemverMatcher, UnchangingUpdaterFactory,
};
use setup::TestIndexer;

// An unseen manifest with one layer and one package scanner finding one
// package ends with a successful report carrying that package, attributes
// it to the layer it came from, and marks the manifest scanned.
#[tokio::test]
async fn single_layer_single_package_is_indexed() {
    let source = FakeLayerSource::default().with_layer("layer-a", debian_layer_fs(&[("musl", "1.2.3")]));
    let indexer = TestIndexer::new(vec![dpkg_ecosystem()], source);
    let layer = layer_ref("sha256:a", "layer-a");

    let report = indexer.scan(vec![layer.clone()]).await;

    assert!(report.success, "expected a successful scan, got {:?}", report.err);
    assert_eq!(report.packages.len(), 1);
    let package = report.packages.values().next().unwrap();
    assert_eq!(package.name, "musl");
    let introduced = report.package_introduced_in.get(&package.id()).unwrap();
    assert_eq!(introduced, &layer.digest);

    let scanners = vec![
        clairctl::domain::ScannerMeta::new("dpkg", "1", clairctl::domain::ScannerKind::Package),
        clairctl::domain::ScannerMeta::new("os-release", "1", clairctl::domain::ScannerKind::Distribution),
    ];
    assert!(indexer.store.manifest_scanned(&report.manifest_hash, &scanners).await);
}

// A two-layer image where layer B removes package P (present in A, not
// in B's dpkg status) must not carry P in the coalesced report.
#[tokio::test]
async fn package_removed_in_later_layer_is_absent() {
    let source = FakeLayerSource::default()
        .with_layer("layer-a", debian_layer_fs(&[("musl", "1.2.3"), ("openssl", "1.1.1")]))
        .with_layer("layer-b", debian_layer_fs(&[("openssl", "1.1.1")]));
    let indexer = TestIndexer::new(vec![dpkg_ecosystem()], source);

    let report = indexer
        .scan(vec![layer_ref("sha256:a", "layer-a"), layer_ref("sha256:b", "layer-b")])
        .await;

    assert!(report.success, "expected a successful scan, got {:?}", report.err);
    let names: Vec<&str> = report.packages.values().map(|p| p.name.as_str()).collect();
    assert!(!names.contains(&"musl"), "removed package musl should not survive coalescing: {names:?}");
    assert!(names.contains(&"openssl"));
}

// Debian os-release with an explicit VERSION_CODENAME ends up attached
// to the package's distribution in the coalesced report.
#[tokio::test]
async fn debian_distribution_is_attached_to_package() {
    let source = FakeLayerSource::default().with_layer("layer-a", debian_layer_fs(&[("musl", "1.2.3")]));
    let indexer = TestIndexer::new(vec![dpkg_ecosystem()], source);

    let report = indexer.scan(vec![layer_ref("sha256:a", "layer-a")]).await;

    assert!(report.success);
    let package = report.packages.values().next().unwrap();
    let dist = report
        .package_distribution
        .get(&package.id())
        .expect("distribution should be attached");
    assert_eq!(dist.did, "debian");
    assert_eq!(dist.version_id, "11");
    assert_eq!(dist.version_code_name, "bullseye");
}

// An updater whose fetch reports Unchanged must leave the latest update
// operations untouched, and a subsequent match must read the prior
// snapshot rather than nothing.
#[tokio::test]
async fn unchanged_feed_leaves_prior_snapshot_in_place() {
    let store = Arc::new(InMemoryStore::new());
    let reference = uuid::Uuid::new_v4();
    let fp = Fingerprint::from_bytes(b"etag-1".to_vec());
    let vuln = Vulnerability::new(
        "CVE-2024-0001",
        "a vulnerability",
        "high",
        Utc::now(),
        vec![],
        "openssl",
        None,
        None,
        Some("1.2.0".to_string()),
        None,
        ArchOp::All,
    );
    store
        .update_vulnerabilities(
            reference,
            "unchanging",
            fp,
            clairctl::app::store::ParsedVulnerabilities {
                vulnerabilities: vec![vuln],
            },
        )
        .await
        .unwrap();

    let lock: Arc<dyn Lock> = Arc::new(InMemoryLock::new());
    let calls = Arc::new(std::sync::Mutex::new(0u32));
    let factories: Vec<Arc<dyn clairctl::app::updater::UpdaterFactory>> =
        vec![Arc::new(UnchangingUpdaterFactory { calls: calls.clone() })];
    let pipeline = UpdaterPipeline::new(store.clone(), lock, factories);

    pipeline.run(CancellationToken::new(), &ConfigBlob::default(), false).await.unwrap();

    assert_eq!(*calls.lock().unwrap(), 1, "fetch() should have been attempted once");

    let latest = store.get_latest_update_operations().await;
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].reference, reference, "unchanged fetch must not replace the prior operation");

    let mut report = IndexReport::new(clairctl::domain::Digest::new("sha256:manifest"));
    let package = Package::new("openssl", "1.0.0", PackageKind::Binary, "amd64", None, "dpkg", None);
    report.packages.insert(package.id(), package);

    let matcher = Matcher::new(vec![Arc::new(SemverMatcher)], store.clone() as Arc<dyn Store>);
    let vuln_report = matcher.match_(&report).await.unwrap();
    assert_eq!(vuln_report.vulnerabilities.len(), 1, "match should still see the prior snapshot's vulnerability");
}

// When a matcher's VersionFilter is authoritative, the store's result
// passes through unchanged and vulnerable() is never invoked.
#[tokio::test]
async fn authoritative_version_filter_skips_local_check() {
    let store = Arc::new(InMemoryStore::new());
    let vuln = Vulnerability::new(
        "CVE-2024-0002",
        "a vulnerability",
        "high",
        Utc::now(),
        vec![],
        "openssl",
        None,
        None,
        Some("2.0.0".to_string()),
        None,
        ArchOp::All,
    );
    store
        .update_vulnerabilities(
            uuid::Uuid::new_v4(),
            "semver-feed",
            Fingerprint::from_bytes(b"v1".to_vec()),
            clairctl::app::store::ParsedVulnerabilities {
                vulnerabilities: vec![vuln],
            },
        )
        .await
        .unwrap();

    let mut report = IndexReport::new(clairctl::domain::Digest::new("sha256:manifest"));
    let package = Package::new("openssl", "1.0.0", PackageKind::Binary, "amd64", None, "dpkg", None);
    let package_id = package.id();
    report.packages.insert(package_id.clone(), package);

    let matcher = Matcher::new(vec![Arc::new(AuthoritativeStoreMatcher)], store as Arc<dyn Store>);
    // If AuthoritativeStoreMatcher::vulnerable() were called, it would
    // panic; reaching this point unwound cleanly proves it wasn't.
    let vuln_report = matcher.match_(&report).await.unwrap();

    let findings = vuln_report.package_vulnerabilities.get(&package_id).unwrap();
    assert_eq!(findings.len(), 1);
}

// Two concurrent acquisitions of the same updater lock key see exactly
// one succeed; the other is told to skip (no panic, no deadlock).
#[tokio::test]
async fn concurrent_lock_on_same_key_only_one_wins() {
    let lock = InMemoryLock::new();
    let (first, second) = try_lock_both(&lock, "update/osv").await;

    assert!(first);
    assert!(!second, "a second concurrent acquisition of the same key must be refused");

    // Once released, the key is acquirable again — contention wasn't a
    // permanent poison.
    let (third, _) = try_lock_both(&lock, "update/osv").await;
    assert!(third);
}

// If an updater's lock is already held when the pipeline runs, that
// updater is skipped for this pass rather than blocking: fetch() must
// never be called, and the run itself still reports success.
#[tokio::test]
async fn pipeline_skips_updater_whose_lock_is_already_held() {
    let store = Arc::new(InMemoryStore::new());
    let lock = Arc::new(InMemoryLock::new());
    let held = lock.try_lock(CancellationToken::new(), "update/unchanging").await.unwrap();

    let calls = Arc::new(std::sync::Mutex::new(0u32));
    let factories: Vec<Arc<dyn clairctl::app::updater::UpdaterFactory>> =
        vec![Arc::new(UnchangingUpdaterFactory { calls: calls.clone() })];
    let pipeline = UpdaterPipeline::new(store, lock.clone() as Arc<dyn Lock>, factories);

    pipeline.run(CancellationToken::new(), &ConfigBlob::default(), false).await.unwrap();

    assert_eq!(*calls.lock().unwrap(), 0, "fetch() must not run while the updater's lock is held elsewhere");

    held.release();
}

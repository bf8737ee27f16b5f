use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use clairctl::app::layer_fetch::{FetchedLayer, LayerFetchError, LayerFetcher, LayerUnpacker, Spool};
use clairctl::app::lock::Lock;
use clairctl::app::scanner::{DistributionScanner, Ecosystem, LayerFilesystem, PackageScanner, RepositoryScanner, ScanError, VersionedScanner};
use clairctl::app::updater::{ConfigBlob, FeedArchive, FetchOutcome, Updater, UpdaterError, UpdaterFactory, VulnerabilityParser};
use clairctl::app::store::ParsedVulnerabilities;
use clairctl::domain::manifest::LayerRef;
use clairctl::domain::update_operation::Fingerprint;
use clairctl::domain::{Distribution, Layer, Package, Repository, ScannerKind, ScannerMeta};
use clairctl::infra::{DpkgScanner, OsReleaseScanner, StackerCoalescer};
use tokio_util::sync::CancellationToken;

/// An in-memory filesystem view keyed by absolute path, standing in for a
/// decoded layer archive without pulling the `tar` crate into the test
/// harness.
#[derive(Default)]
pub struct FakeFilesystem(pub HashMap<&'static str, Vec<u8>>);

impl LayerFilesystem for FakeFilesystem {
    fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        self.0.get(path).cloned()
    }

    fn list_files(&self) -> Vec<String> {
        self.0.keys().map(|s| s.to_string()).collect()
    }
}

/// Stands in for `HttpLayerFetcher` + `TarUnpacker`: layer URIs are keys
/// into a map of pre-built filesystem views rather than real HTTP/tar
/// decoding, so scenario tests exercise the indexer controller without a
/// network dependency.
#[derive(Default)]
pub struct FakeLayerSource {
    filesystems: HashMap<String, Arc<dyn LayerFilesystem>>,
}

impl FakeLayerSource {
    pub fn with_layer(mut self, uri: impl Into<String>, fs: FakeFilesystem) -> Self {
        self.filesystems.insert(uri.into(), Arc::new(fs));
        self
    }
}

#[async_trait::async_trait]
impl LayerFetcher for FakeLayerSource {
    async fn fetch(&self, _ctx: CancellationToken, layer: &LayerRef) -> Result<FetchedLayer, LayerFetchError> {
        Ok(FetchedLayer {
            layer: layer.clone(),
            spool: Spool::Memory(bytes::Bytes::from(layer.uri.clone())),
        })
    }
}

impl LayerUnpacker for FakeLayerSource {
    fn unpack(&self, fetched: &FetchedLayer) -> Result<Arc<dyn LayerFilesystem>, LayerFetchError> {
        self.filesystems
            .get(&fetched.layer.uri)
            .cloned()
            .ok_or_else(|| LayerFetchError::Canceled {
                digest: fetched.layer.digest.to_string(),
            })
    }
}

pub fn layer_ref(digest: &str, uri: &str) -> LayerRef {
    LayerRef::new(clairctl::domain::Digest::new(digest), uri)
}

pub fn dpkg_ecosystem() -> Arc<Ecosystem> {
    let scanners = vec![
        ScannerMeta::new("dpkg", "1", ScannerKind::Package),
        ScannerMeta::new("os-release", "1", ScannerKind::Distribution),
    ];
    Arc::new(Ecosystem {
        name: "dpkg".to_string(),
        package_scanners: vec![Arc::new(DpkgScanner)],
        distribution_scanners: vec![Arc::new(OsReleaseScanner)],
        repository_scanners: vec![],
        coalescer: Arc::new(StackerCoalescer::new(scanners)),
    })
}

fn dpkg_status(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut out = String::new();
    for (name, version) in entries {
        out.push_str(&format!(
            "Package: {name}\nStatus: install ok installed\nVersion: {version}\nArchitecture: amd64\n\n"
        ));
    }
    out.into_bytes()
}

/// A layer's filesystem carrying a dpkg status database with the given
/// installed packages, plus a Debian `os-release`.
pub fn debian_layer_fs(packages: &[(&str, &str)]) -> FakeFilesystem {
    let mut files = HashMap::new();
    files.insert("/var/lib/dpkg/status", dpkg_status(packages));
    files.insert(
        "/etc/os-release",
        b"ID=debian\nNAME=\"Debian GNU/Linux\"\nVERSION_ID=\"11\"\nVERSION_CODENAME=bullseye\n".to_vec(),
    );
    FakeFilesystem(files)
}

/// A `VersionFilter`-authoritative matcher: `vulnerable()` panics if ever
/// invoked, proving the engine trusted the store's filtered result.
pub struct AuthoritativeStoreMatcher;

#[async_trait::async_trait]
impl clairctl::app::matcher::MatcherPlugin for AuthoritativeStoreMatcher {
    fn name(&self) -> String {
        "authoritative".to_string()
    }

    fn filter(&self, _record: &clairctl::app::store::MatchQueryRecord) -> bool {
        true
    }

    fn query(&self) -> Vec<clairctl::app::store::MatchConstraint> {
        vec![clairctl::app::store::MatchConstraint::PackageName]
    }

    async fn vulnerable(&self, _record: &clairctl::app::store::MatchQueryRecord, _vuln: &clairctl::domain::Vulnerability) -> bool {
        panic!("vulnerable() must never be called when the store's filtering is authoritative");
    }

    fn as_version_filter(&self) -> Option<&dyn clairctl::app::matcher::VersionFilter> {
        Some(self)
    }
}

impl clairctl::app::matcher::VersionFilter for AuthoritativeStoreMatcher {
    fn version_authoritative(&self) -> bool {
        true
    }
}

/// A minimal updater whose `fetch()` always reports `Unchanged`, proving
/// the pipeline must not touch the store at all in that case.
pub struct UnchangingUpdater {
    pub calls: Arc<Mutex<u32>>,
}

#[async_trait::async_trait]
impl Updater for UnchangingUpdater {
    fn name(&self) -> String {
        "unchanging".to_string()
    }

    async fn fetch(
        &self,
        _ctx: CancellationToken,
        _previous: Option<&Fingerprint>,
        _zip: &mut zip::ZipWriter<std::fs::File>,
        _http: &reqwest::Client,
    ) -> Result<FetchOutcome, UpdaterError> {
        *self.calls.lock().unwrap() += 1;
        Ok(FetchOutcome::Unchanged)
    }

    fn as_vulnerability_parser(&self) -> Option<&dyn VulnerabilityParser> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl VulnerabilityParser for UnchangingUpdater {
    async fn parse_vulnerability(
        &self,
        _ctx: CancellationToken,
        _archive: &dyn FeedArchive,
    ) -> Result<ParsedVulnerabilities, UpdaterError> {
        panic!("parse_vulnerability must not run when fetch() reports Unchanged");
    }
}

pub struct UnchangingUpdaterFactory {
    pub calls: Arc<Mutex<u32>>,
}

#[async_trait::async_trait]
impl UpdaterFactory for UnchangingUpdaterFactory {
    fn name(&self) -> String {
        "unchanging".to_string()
    }

    async fn create(&self, _ctx: CancellationToken, _config: &ConfigBlob) -> Vec<Arc<dyn Updater>> {
        vec![Arc::new(UnchangingUpdater {
            calls: self.calls.clone(),
        })]
    }
}

/// A no-op distribution/repository-free package scanner used where a test
/// wants a controllable scanner identity without dragging in dpkg parsing.
#[allow(dead_code)]
pub struct FixedPackageScanner {
    pub packages: Vec<Package>,
}

impl VersionedScanner for FixedPackageScanner {
    fn meta(&self) -> ScannerMeta {
        ScannerMeta::new("fixed", "1", ScannerKind::Package)
    }
}

#[async_trait::async_trait]
impl PackageScanner for FixedPackageScanner {
    async fn scan(&self, _layer: &Layer, _fs: &dyn LayerFilesystem) -> Result<Vec<Package>, ScanError> {
        Ok(self.packages.clone())
    }
}

#[allow(dead_code)]
pub struct EmptyDistributionScanner;

impl VersionedScanner for EmptyDistributionScanner {
    fn meta(&self) -> ScannerMeta {
        ScannerMeta::new("none", "1", ScannerKind::Distribution)
    }
}

#[async_trait::async_trait]
impl DistributionScanner for EmptyDistributionScanner {
    async fn scan(&self, _layer: &Layer, _fs: &dyn LayerFilesystem) -> Result<Option<Distribution>, ScanError> {
        Ok(None)
    }
}

#[allow(dead_code)]
pub struct EmptyRepositoryScanner;

impl VersionedScanner for EmptyRepositoryScanner {
    fn meta(&self) -> ScannerMeta {
        ScannerMeta::new("none", "1", ScannerKind::Repository)
    }
}

#[async_trait::async_trait]
impl RepositoryScanner for EmptyRepositoryScanner {
    async fn scan(&self, _layer: &Layer, _fs: &dyn LayerFilesystem) -> Result<Vec<Repository>, ScanError> {
        Ok(vec![])
    }
}

/// A generic semver-comparing matcher with no distribution/repository
/// opinion, used where a scenario only needs "is this package's version
/// below the fixed-in version" without dragging in dpkg's own comparator.
pub struct SemverMatcher;

#[async_trait::async_trait]
impl clairctl::app::matcher::MatcherPlugin for SemverMatcher {
    fn name(&self) -> String {
        "semver".to_string()
    }

    fn filter(&self, _record: &clairctl::app::store::MatchQueryRecord) -> bool {
        true
    }

    fn query(&self) -> Vec<clairctl::app::store::MatchConstraint> {
        vec![clairctl::app::store::MatchConstraint::PackageName]
    }

    async fn vulnerable(&self, record: &clairctl::app::store::MatchQueryRecord, vuln: &clairctl::domain::Vulnerability) -> bool {
        match &vuln.fixed_in_version {
            Some(fixed) => match (semver::Version::parse(&record.package_version), semver::Version::parse(fixed)) {
                (Ok(installed), Ok(fixed)) => installed < fixed,
                _ => true,
            },
            None => true,
        }
    }
}

/// Convenience wrapper so scenario tests can assert on lock contention
/// without wiring a whole `UpdaterPipeline`.
pub async fn try_lock_both(lock: &dyn Lock, key: &str) -> (bool, bool) {
    let ctx_a = CancellationToken::new();
    let ctx_b = CancellationToken::new();
    let first = lock.try_lock(ctx_a, key).await;
    let second = lock.try_lock(ctx_b, key).await;
    let first_ok = first.is_some();
    let second_ok = second.is_some();
    if let Some(guard) = first {
        guard.release();
    }
    (first_ok, second_ok)
}

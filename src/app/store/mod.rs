//! transactional persistence for both indexer artifacts and updater
//! snapshots.
//!
//! This module only defines the port. The reference adapter
//! (`infra::store::in_memory::InMemoryStore`) is a drop-in implementation of
//! the contract below; the relational schema of a production backend is
//! explicitly out of scope.

pub mod error;
pub mod model;

pub use error::StoreError;
pub use model::{MatchConstraint, MatchOptions, MatchQueryRecord, MatchResults, ParsedVulnerabilities};

use crate::domain::{
    Digest, Distribution, IndexReport, Package, Repository, ScannerMeta, UpdateKind, UpdateOperation,
};

/// C8's atomic operations. Implementors perform no locking in their own
/// right from the caller's perspective — every multi-row write is wrapped
/// in a transaction internally.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// True iff every scanner in `scanners` has already scanned every layer
    /// of the manifest identified by `hash` (I1).
    async fn manifest_scanned(&self, hash: &Digest, scanners: &[ScannerMeta]) -> bool;

    /// True iff at least one artifact row attests to the `(layer, scanner)`
    /// pair (I2).
    async fn layer_scanned(&self, layer: &Digest, scanner: &ScannerMeta) -> bool;

    /// Inserts deduplicated package artifacts and the `(layer, scanner)`
    /// attestation row within one transaction.
    async fn index_packages(
        &self,
        artifacts: Vec<Package>,
        layer: &Digest,
        scanner: &ScannerMeta,
    ) -> Result<(), StoreError>;

    async fn index_distributions(
        &self,
        artifacts: Vec<Distribution>,
        layer: &Digest,
        scanner: &ScannerMeta,
    ) -> Result<(), StoreError>;

    async fn index_repositories(
        &self,
        artifacts: Vec<Repository>,
        layer: &Digest,
        scanner: &ScannerMeta,
    ) -> Result<(), StoreError>;

    async fn packages_by_layer(&self, layer: &Digest, scanners: &[ScannerMeta]) -> Vec<Package>;
    async fn distributions_by_layer(&self, layer: &Digest, scanners: &[ScannerMeta]) -> Vec<Distribution>;
    async fn repositories_by_layer(&self, layer: &Digest, scanners: &[ScannerMeta]) -> Vec<Repository>;

    async fn scan_report(&self, manifest: &Digest) -> Result<Option<IndexReport>, StoreError>;
    async fn set_scan_report(&self, report: IndexReport) -> Result<(), StoreError>;
    async fn set_scan_finished(&self, report: IndexReport, scanners: &[ScannerMeta]) -> Result<(), StoreError>;

    /// Single transaction: creates the operation row, inserts vulnerability
    /// rows deduplicated by content hash (`ON CONFLICT DO NOTHING`
    /// semantics), associates them with the operation, and makes it the
    /// latest for `updater` (I4, I5).
    async fn update_vulnerabilities(
        &self,
        reference: uuid::Uuid,
        updater: &str,
        fingerprint: crate::domain::update_operation::Fingerprint,
        parsed: ParsedVulnerabilities,
    ) -> Result<(), StoreError>;

    async fn update_enrichments(
        &self,
        reference: uuid::Uuid,
        updater: &str,
        kind: UpdateKind,
        fingerprint: crate::domain::update_operation::Fingerprint,
        records: Vec<crate::domain::EnrichmentRecord>,
    ) -> Result<(), StoreError>;

    async fn get_latest_update_operations(&self) -> Vec<UpdateOperation>;

    /// The matcher query: candidate records equi-joined against the latest
    /// vulnerability snapshot, optionally with database-side version
    /// filtering.
    async fn get(
        &self,
        records: &[MatchQueryRecord],
        constraints: &[MatchConstraint],
        opts: &MatchOptions,
    ) -> MatchResults;
}

//! per-ecosystem reduction of per-layer artifacts into a final
//! image-wide artifact set.

use std::collections::HashMap;

use thiserror::Error;

use crate::app::error::{Classify, ErrorKind};
use crate::app::store::Store;
use crate::domain::{Digest, Distribution, Layer, Package, PackageId, Repository};

#[derive(Error, Debug)]
pub enum CoalesceError {
    #[error("store error while coalescing: {0}")]
    Store(#[from] crate::app::store::StoreError),
}

impl Classify for CoalesceError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Transient
    }
}

/// The result of coalescing one ecosystem's scanners across a manifest's
/// layers; the controller merges every ecosystem's partial report by
/// last-writer-wins on each sub-map, in configured ecosystem order (§4.1,
/// §5 "Coalescer results are merged deterministically").
#[derive(Debug, Default, Clone)]
pub struct PartialIndexReport {
    pub packages: HashMap<PackageId, Package>,
    pub package_introduced_in: HashMap<PackageId, Digest>,
    pub package_distribution: HashMap<PackageId, Distribution>,
    pub package_repository: HashMap<PackageId, Repository>,
}

impl PartialIndexReport {
    /// Merges `other` into `self` with last-writer-wins semantics on each
    /// key — `other` is treated as coming from a later ecosystem in
    /// configured order, so its entries win on conflict (§4.1, §9
    /// "Ambiguous source behavior": documented, not fixed, because changing
    /// it could silently drop valid dual-ecosystem detections).
    pub fn merge_last_writer_wins(&mut self, other: PartialIndexReport) {
        self.packages.extend(other.packages);
        self.package_introduced_in.extend(other.package_introduced_in);
        self.package_distribution.extend(other.package_distribution);
        self.package_repository.extend(other.package_repository);
    }
}

/// A per-ecosystem reducer. The canonical "stacker" coalescer
/// (`infra::coalescer::stacker`) computes, for each package observed in any
/// layer, the earliest layer digest it first appeared in, and keeps only
/// packages that survive into the final layer.
#[async_trait::async_trait]
pub trait Coalescer: Send + Sync {
    async fn coalesce(
        &self,
        layers: &[Layer],
        store: &dyn Store,
    ) -> Result<PartialIndexReport, CoalesceError>;
}

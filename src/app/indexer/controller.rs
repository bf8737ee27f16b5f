//! per-manifest FSM coordinating C2 (fetch), C3 (scan), and C4
//! (coalesce), persisting an [`IndexReport`] after every transition.
//!
//! Generalizes the teacher's `ComponentFactory` (which lazily builds and
//! caches adapters behind `Option<T>` fields, one per LSP session) into a
//! struct built once at startup and shared via `Arc` across many concurrent
//! `scan` calls — this engine serves many manifests, not one client.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::coalesce::PartialIndexReport;
use crate::app::error::{Classify, ErrorKind};
use crate::app::layer_fetch::{LayerFetcher, LayerUnpacker};
use crate::app::layer_scan::{LayerScanEngine, ScannedLayer};
use crate::app::scanner::Ecosystem;
use crate::app::store::Store;
use crate::domain::{Digest, IndexReport, IndexerState, Layer, Manifest, ScannerMeta};

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("manifest has no layers to scan")]
    EmptyManifest,

    #[error("layer fetch failed: {0}")]
    Fetch(#[from] crate::app::layer_fetch::LayerFetchError),

    #[error("layer scan failed: {0}")]
    LayerScan(#[from] crate::app::layer_scan::LayerScanError),

    #[error("coalesce failed: {0}")]
    Coalesce(#[from] crate::app::coalesce::CoalesceError),

    #[error("store error: {0}")]
    Store(#[from] crate::app::store::StoreError),
}

impl Classify for IndexerError {
    fn kind(&self) -> ErrorKind {
        match self {
            IndexerError::EmptyManifest => ErrorKind::Precondition,
            IndexerError::Fetch(e) => e.kind(),
            IndexerError::LayerScan(e) => e.kind(),
            IndexerError::Coalesce(e) => e.kind(),
            IndexerError::Store(e) => e.kind(),
        }
    }
}

/// P3: the set of layers for which at least one configured scanner has not
/// yet scanned that layer (I2). Used by `FetchLayers` to avoid re-fetching
/// layers every configured scanner has already attested.
pub async fn reduce(store: &dyn Store, scanners: &[ScannerMeta], layers: &[Layer]) -> Vec<Layer> {
    let mut needs_scan = Vec::new();
    for layer in layers {
        let mut pending = false;
        for scanner in scanners {
            if !store.layer_scanned(layer.digest(), scanner).await {
                pending = true;
                break;
            }
        }
        if pending {
            needs_scan.push(layer.clone());
        }
    }
    needs_scan
}

pub struct IndexerController {
    fetcher: Arc<dyn LayerFetcher>,
    unpacker: Arc<dyn LayerUnpacker>,
    layer_scan: Arc<LayerScanEngine>,
    ecosystems: Vec<Arc<Ecosystem>>,
    store: Arc<dyn Store>,
}

impl IndexerController {
    pub fn new(
        fetcher: Arc<dyn LayerFetcher>,
        unpacker: Arc<dyn LayerUnpacker>,
        layer_scan: Arc<LayerScanEngine>,
        ecosystems: Vec<Arc<Ecosystem>>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            fetcher,
            unpacker,
            layer_scan,
            ecosystems,
            store,
        }
    }

    fn all_scanner_metas(&self) -> Vec<ScannerMeta> {
        self.ecosystems.iter().flat_map(|e| e.all_scanner_metas()).collect()
    }

    fn layers_of(manifest: &Manifest) -> Vec<Layer> {
        manifest
            .layers()
            .iter()
            .enumerate()
            .map(|(index, layer_ref)| Layer::new(layer_ref.digest.clone(), index))
            .collect()
    }

    /// Drives `CheckManifest -> FetchLayers -> ScanLayers -> Coalesce ->
    /// ScanFinished -> Terminal`, with any step's error diverting to
    /// `ScanError -> Terminal`. Always returns a terminal
    /// `IndexReport`; the caller never sees a bare error — any state
    /// function's error transitions to `ScanError`, the report is
    /// persisted best-effort, and control returns to the caller.
    pub async fn scan(&self, ctx: CancellationToken, manifest: &Manifest) -> IndexReport {
        let hash = manifest.hash();
        let scanners = self.all_scanner_metas();
        let mut report = IndexReport::new(hash.clone());
        let mut state = IndexerState::CheckManifest;
        let mut all_layers: Vec<Layer> = Vec::new();
        let mut scanned_layers: Vec<ScannedLayer> = Vec::new();

        loop {
            state = match state {
                IndexerState::CheckManifest => {
                    match self.check_manifest(&hash, &scanners).await {
                        Ok(Some(existing)) => {
                            info!(manifest = %hash, "manifest already scanned, short-circuiting");
                            report = existing;
                            IndexerState::Terminal
                        }
                        Ok(None) => IndexerState::FetchLayers,
                        Err(e) => {
                            report.mark_error(e);
                            IndexerState::ScanError
                        }
                    }
                }
                IndexerState::FetchLayers => {
                    all_layers = Self::layers_of(manifest);
                    match self.fetch_layers(ctx.clone(), manifest, &all_layers, &scanners).await {
                        Ok(fetched) => {
                            scanned_layers = fetched;
                            self.persist(&mut report, IndexerState::FetchLayers).await;
                            IndexerState::ScanLayers
                        }
                        Err(e) => {
                            report.mark_error(e);
                            IndexerState::ScanError
                        }
                    }
                }
                IndexerState::ScanLayers => match self.layer_scan.scan(ctx.clone(), &scanned_layers).await {
                    Ok(()) => {
                        self.persist(&mut report, IndexerState::ScanLayers).await;
                        IndexerState::Coalesce
                    }
                    Err(e) => {
                        report.mark_error(e);
                        IndexerState::ScanError
                    }
                },
                IndexerState::Coalesce => match self.coalesce(&all_layers).await {
                    Ok(partial) => {
                        report.packages = partial.packages;
                        report.package_introduced_in = partial.package_introduced_in;
                        report.package_distribution = partial.package_distribution;
                        report.package_repository = partial.package_repository;
                        self.persist(&mut report, IndexerState::Coalesce).await;
                        IndexerState::ScanFinished
                    }
                    Err(e) => {
                        report.mark_error(e);
                        IndexerState::ScanError
                    }
                },
                IndexerState::ScanFinished => {
                    report.mark_finished();
                    if let Err(e) = self.store.set_scan_finished(report.clone(), &scanners).await {
                        warn!(manifest = %hash, error = %e, "failed to persist final scan report");
                    }
                    IndexerState::Terminal
                }
                IndexerState::ScanError => {
                    if let Err(e) = self.store.set_scan_report(report.clone()).await {
                        warn!(manifest = %hash, error = %e, "failed to persist error report");
                    }
                    IndexerState::Terminal
                }
                IndexerState::Terminal => break,
            };
        }

        report
    }

    async fn check_manifest(&self, hash: &Digest, scanners: &[ScannerMeta]) -> Result<Option<IndexReport>, IndexerError> {
        if self.store.manifest_scanned(hash, scanners).await {
            if let Some(existing) = self.store.scan_report(hash).await? {
                return Ok(Some(existing));
            }
        }
        Ok(None)
    }

    async fn fetch_layers(
        &self,
        ctx: CancellationToken,
        manifest: &Manifest,
        all_layers: &[Layer],
        scanners: &[ScannerMeta],
    ) -> Result<Vec<ScannedLayer>, IndexerError> {
        if all_layers.is_empty() {
            return Err(IndexerError::EmptyManifest);
        }

        let pending = reduce(self.store.as_ref(), scanners, all_layers).await;
        let mut scanned = Vec::with_capacity(pending.len());
        for layer in pending {
            let layer_ref = manifest
                .layers()
                .iter()
                .find(|l| &l.digest == layer.digest())
                .expect("reduce only returns layers present in the manifest");

            let fetched = self.fetcher.fetch(ctx.clone(), layer_ref).await?;
            let fs = self.unpacker.unpack(&fetched)?;
            scanned.push(ScannedLayer { layer, fs });
        }
        Ok(scanned)
    }

    async fn coalesce(&self, all_layers: &[Layer]) -> Result<PartialIndexReport, IndexerError> {
        let mut merged = PartialIndexReport::default();
        for ecosystem in &self.ecosystems {
            let partial = ecosystem.coalescer.coalesce(all_layers, self.store.as_ref()).await?;
            merged.merge_last_writer_wins(partial);
        }
        Ok(merged)
    }

    async fn persist(&self, report: &mut IndexReport, state: IndexerState) {
        report.state = state;
        if let Err(e) = self.store.set_scan_report(report.clone()).await {
            warn!(manifest = %report.manifest_hash, error = %e, "failed to persist intermediate scan report");
        }
    }
}

use std::sync::Arc;

use clairctl::app::indexer::IndexerController;
use clairctl::app::layer_scan::LayerScanEngine;
use clairctl::app::scanner::Ecosystem;
use clairctl::app::store::Store;
use clairctl::domain::manifest::{LayerRef, Manifest};
use clairctl::domain::IndexReport;
use clairctl::infra::InMemoryStore;
use tokio_util::sync::CancellationToken;

use crate::common::FakeLayerSource;

/// Wires one `IndexerController` against a fresh `InMemoryStore` and a
/// caller-supplied `FakeLayerSource`, enough to drive a scan end to end
/// without touching the network or a real tar decoder.
pub struct TestIndexer {
    pub store: Arc<InMemoryStore>,
    controller: IndexerController,
}

impl TestIndexer {
    pub fn new(ecosystems: Vec<Arc<Ecosystem>>, source: FakeLayerSource) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let source = Arc::new(source);
        let layer_scan = Arc::new(LayerScanEngine::new(ecosystems.clone(), store.clone() as Arc<dyn Store>, 4));
        let controller = IndexerController::new(source.clone(), source, layer_scan, ecosystems, store.clone() as Arc<dyn Store>);
        Self { store, controller }
    }

    pub async fn scan(&self, layers: Vec<LayerRef>) -> IndexReport {
        let manifest = Manifest::new(layers);
        self.controller.scan(CancellationToken::new(), &manifest).await
    }
}

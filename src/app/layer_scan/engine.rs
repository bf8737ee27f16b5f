//! bounded-parallel execution of each `(layer, scanner)` pair with
//! per-pair idempotence via the store.
//!
//! Grounded in `other_examples/.../sps2/crates/audit/src/scanner.rs`'s
//! `Arc::new(Semaphore::new(self.config.max_concurrent))` fan-out, reusing
//! the `Semaphore` + `JoinSet` idiom `app::matcher::engine` already
//! establishes for this crate rather than introducing `FuturesUnordered` as
//! a second bounded-fan-out shape.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::app::error::{Classify, ErrorKind};
use crate::app::scanner::{Ecosystem, LayerFilesystem};
use crate::app::store::Store;
use crate::domain::{Layer, ScannerMeta};

#[derive(Error, Debug)]
pub enum LayerScanError {
    #[error("scanner {scanner} failed on layer {layer}: {message}")]
    Scan {
        scanner: String,
        layer: String,
        message: String,
    },

    #[error("store error while scanning: {0}")]
    Store(#[from] crate::app::store::StoreError),

    #[error("layer scan was canceled")]
    Canceled,
}

impl Classify for LayerScanError {
    fn kind(&self) -> ErrorKind {
        match self {
            LayerScanError::Scan { .. } => ErrorKind::Transient,
            LayerScanError::Store(e) => e.kind(),
            LayerScanError::Canceled => ErrorKind::Precondition,
        }
    }
}

/// A layer paired with its already-unpacked filesystem view, as handed to
/// the engine by the indexer controller after `FetchLayers`.
#[derive(Clone)]
pub struct ScannedLayer {
    pub layer: Layer,
    pub fs: Arc<dyn LayerFilesystem>,
}

enum Task {
    Package(ScannedLayer, Arc<dyn crate::app::scanner::PackageScanner>),
    Distribution(ScannedLayer, Arc<dyn crate::app::scanner::DistributionScanner>),
    Repository(ScannedLayer, Arc<dyn crate::app::scanner::RepositoryScanner>),
}

impl Task {
    fn meta(&self) -> ScannerMeta {
        match self {
            Task::Package(_, s) => s.meta(),
            Task::Distribution(_, s) => s.meta(),
            Task::Repository(_, s) => s.meta(),
        }
    }

    fn layer_digest(&self) -> crate::domain::Digest {
        match self {
            Task::Package(l, _) => l.layer.digest().clone(),
            Task::Distribution(l, _) => l.layer.digest().clone(),
            Task::Repository(l, _) => l.layer.digest().clone(),
        }
    }

    async fn run(self, store: &dyn Store) -> Result<(), LayerScanError> {
        let meta = self.meta();
        let layer_digest = self.layer_digest();
        match self {
            Task::Package(sl, scanner) => {
                let artifacts = scanner.scan(&sl.layer, sl.fs.as_ref()).await.map_err(|e| LayerScanError::Scan {
                    scanner: meta.to_string(),
                    layer: layer_digest.to_string(),
                    message: e.to_string(),
                })?;
                store.index_packages(artifacts, &layer_digest, &meta).await?;
            }
            Task::Distribution(sl, scanner) => {
                let found = scanner.scan(&sl.layer, sl.fs.as_ref()).await.map_err(|e| LayerScanError::Scan {
                    scanner: meta.to_string(),
                    layer: layer_digest.to_string(),
                    message: e.to_string(),
                })?;
                store
                    .index_distributions(found.into_iter().collect(), &layer_digest, &meta)
                    .await?;
            }
            Task::Repository(sl, scanner) => {
                let artifacts = scanner.scan(&sl.layer, sl.fs.as_ref()).await.map_err(|e| LayerScanError::Scan {
                    scanner: meta.to_string(),
                    layer: layer_digest.to_string(),
                    message: e.to_string(),
                })?;
                store.index_repositories(artifacts, &layer_digest, &meta).await?;
            }
        }
        Ok(())
    }
}

/// C3. Holds the full configured scanner set (across every ecosystem) and a
/// store handle; the indexer controller constructs one of these at startup
/// and shares it via `Arc` across concurrent manifest scans.
pub struct LayerScanEngine {
    ecosystems: Vec<Arc<Ecosystem>>,
    store: Arc<dyn Store>,
    concurrency: usize,
}

impl LayerScanEngine {
    /// `concurrency` is coerced to at least 1; the
    /// effective bound is additionally capped at the number of layers being
    /// scanned in a given call.
    pub fn new(ecosystems: Vec<Arc<Ecosystem>>, store: Arc<dyn Store>, concurrency: usize) -> Self {
        Self {
            ecosystems,
            store,
            concurrency: concurrency.max(1),
        }
    }

    fn build_tasks(&self, layers: &[ScannedLayer]) -> Vec<Task> {
        let mut tasks = Vec::new();
        for sl in layers {
            for ecosystem in &self.ecosystems {
                for s in &ecosystem.package_scanners {
                    tasks.push(Task::Package(sl.clone(), s.clone()));
                }
                for s in &ecosystem.distribution_scanners {
                    tasks.push(Task::Distribution(sl.clone(), s.clone()));
                }
                for s in &ecosystem.repository_scanners {
                    tasks.push(Task::Repository(sl.clone(), s.clone()));
                }
            }
        }
        tasks
    }

    /// Runs every `(layer, scanner)` pair exactly once, skipping pairs the
    /// store already reports scanned (I2). Cancellation: if any task
    /// errors, `ctx` is canceled and tasks still waiting on a semaphore
    /// permit exit promptly without acquiring one (§4.2, §7: "first error
    /// cancels siblings").
    pub async fn scan(&self, ctx: CancellationToken, layers: &[ScannedLayer]) -> Result<(), LayerScanError> {
        let tasks = self.build_tasks(layers);
        if tasks.is_empty() {
            return Ok(());
        }

        let permits = self.concurrency.min(layers.len().max(1));
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut set = JoinSet::new();
        for task in tasks {
            let store = self.store.clone();
            let semaphore = semaphore.clone();
            let ctx = ctx.clone();
            set.spawn(async move {
                if ctx.is_cancelled() {
                    return Ok(());
                }

                let meta = task.meta();
                let layer_digest = task.layer_digest();
                if store.layer_scanned(&layer_digest, &meta).await {
                    return Ok(());
                }

                let _permit = tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return Ok(()),
                    permit = semaphore.acquire_owned() => permit.expect("semaphore closed"),
                };

                if ctx.is_cancelled() {
                    return Ok(());
                }

                task.run(store.as_ref()).await
            });
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            match joined.expect("layer-scan task panicked") {
                Ok(()) => {}
                Err(e) => {
                    if first_error.is_none() {
                        ctx.cancel();
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

//! the updater pipeline. Drives Fetch -> Parse ->
//! `Store::update_vulnerabilities`/`update_enrichments` for every configured
//! updater, each lock-guarded run executing in parallel bounded by the
//! number of logical cores (§4.3: "Per Updater, in parallel bounded by
//! GOMAXPROCS cores"; §5: "different updaters run concurrently"), using the
//! same `Semaphore` + `JoinSet` idiom as `layer_scan::engine` and
//! `matcher::engine`.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use zip::{ZipArchive, ZipWriter};

use crate::app::error::{Classify, ErrorKind};
use crate::app::lock::Lock;
use crate::app::store::{Store, StoreError};
use crate::app::updater::traits::{ConfigBlob, FeedArchive, FetchOutcome, Updater, UpdaterError, UpdaterFactory};
use crate::domain::update_operation::Fingerprint;
use crate::domain::UpdateKind;

#[derive(Error, Debug)]
pub enum UpdaterPipelineError {
    #[error(transparent)]
    Updater(#[from] UpdaterError),
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Strict-mode joined failure: every updater that errored, not just the
    /// first (§4.3, §7: "In strict mode, all errors are joined and
    /// returned"), mirroring `JoinedMatcherError` in `matcher::engine`.
    #[error("{} updater(s) failed: {}", .0.len(), .0.iter().map(|(n, e)| format!("{n}: {e}")).collect::<Vec<_>>().join("; "))]
    Joined(Vec<(String, UpdaterPipelineError)>),
}

impl Classify for UpdaterPipelineError {
    fn kind(&self) -> ErrorKind {
        match self {
            UpdaterPipelineError::Updater(e) => e.kind(),
            UpdaterPipelineError::Store(e) => e.kind(),
            UpdaterPipelineError::Joined(_) => ErrorKind::Transient,
        }
    }
}

/// Reads entries back out of the zip spooled by an [`Updater::fetch`] call.
struct SpooledArchive {
    inner: Mutex<ZipArchive<std::fs::File>>,
}

impl FeedArchive for SpooledArchive {
    fn read(&self, path: &str) -> Option<Vec<u8>> {
        let mut archive = self.inner.lock().expect("archive lock poisoned");
        let mut file = archive.by_name(path).ok()?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).ok()?;
        Some(buf)
    }

    fn list(&self) -> Vec<String> {
        let archive = self.inner.lock().expect("archive lock poisoned");
        archive.file_names().map(|s| s.to_string()).collect()
    }
}

pub struct UpdaterPipeline<S: Store + ?Sized + 'static> {
    store: Arc<S>,
    lock: Arc<dyn Lock>,
    factories: Vec<Arc<dyn UpdaterFactory>>,
    http: reqwest::Client,
}

impl<S: Store + ?Sized + 'static> UpdaterPipeline<S> {
    pub fn new(store: Arc<S>, lock: Arc<dyn Lock>, factories: Vec<Arc<dyn UpdaterFactory>>) -> Self {
        Self {
            store,
            lock,
            factories,
            http: reqwest::Client::new(),
        }
    }

    /// Collects updaters from every factory, dropping same-named duplicates
    /// across factories with a warning instead of failing the run — the same
    /// idempotent-by-default idiom as `ScannerRegistry::register`.
    async fn collect_updaters(&self, ctx: CancellationToken, config: &ConfigBlob) -> Vec<Arc<dyn Updater>> {
        let mut by_name: HashMap<String, Arc<dyn Updater>> = HashMap::new();
        for factory in &self.factories {
            for updater in factory.create(ctx.clone(), config).await {
                let name = updater.name();
                if name.contains('/') {
                    warn!(updater = %name, "updater name contains '/', skipping");
                    continue;
                }
                if let Err(e) = updater.validate_contributes_something() {
                    warn!(updater = %name, error = %e, "skipping updater that contributes nothing");
                    continue;
                }
                if by_name.contains_key(&name) {
                    warn!(updater = %name, "duplicate updater name across factories, keeping first");
                    continue;
                }
                by_name.insert(name, updater);
            }
        }
        by_name.into_values().collect()
    }

    /// Runs every configured updater once, fanned out in parallel bounded
    /// by the number of logical cores. In `strict` mode, the first failure
    /// cancels the remaining in-flight updaters, but every updater that
    /// still produced an error (including ones already racing to finish
    /// when cancellation fires) is joined into `UpdaterPipelineError::Joined`
    /// rather than only the first; otherwise every updater's failure is
    /// logged and the rest still run to completion (§4.3, §7: one feed's
    /// failure does not block the others unless running strict, and strict
    /// mode joins every error rather than returning just one).
    pub async fn run(&self, ctx: CancellationToken, config: &ConfigBlob, strict: bool) -> Result<(), UpdaterPipelineError> {
        let updaters = self.collect_updaters(ctx.clone(), config).await;
        let latest = self.store.get_latest_update_operations().await;

        let permits = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut set = JoinSet::new();
        for updater in updaters {
            let semaphore = semaphore.clone();
            let ctx = ctx.clone();
            let lock = self.lock.clone();
            let store = self.store.clone();
            let http = self.http.clone();
            let previous_fingerprint = latest.iter().find(|op| op.updater == updater.name()).map(|op| op.fingerprint.clone());

            set.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return (updater.name(), Ok(())),
                    permit = semaphore.acquire_owned() => permit.expect("semaphore closed"),
                };

                if ctx.is_cancelled() {
                    return (updater.name(), Ok(()));
                }

                let name = updater.name();
                let lock_key = format!("update/{name}");
                let guard = match lock.try_lock(ctx.child_token(), &lock_key).await {
                    Some(guard) => guard,
                    None => {
                        info!(updater = %name, "lock held elsewhere, skipping this pass");
                        return (name, Ok(()));
                    }
                };

                let result = run_one(
                    store.as_ref(),
                    &http,
                    ctx.clone(),
                    updater.as_ref(),
                    previous_fingerprint.as_ref(),
                )
                .await;

                guard.release();
                (name, result)
            });
        }

        let mut errors = Vec::new();
        while let Some(joined) = set.join_next().await {
            let (name, result) = joined.expect("updater task panicked");
            match result {
                Ok(()) => info!(updater = %name, "updater run complete"),
                Err(e) => {
                    error!(updater = %name, error = %e, "updater failed");
                    if strict {
                        ctx.cancel();
                        errors.push((name, e));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(UpdaterPipelineError::Joined(errors))
        }
    }
}

/// One updater's fetch -> parse -> commit, strictly sequential within the
/// updater but run concurrently with every other updater's own `run_one`
/// call by the caller's `JoinSet` (§5: "Updater steps ... are strictly
/// sequential per updater; different updaters run concurrently").
async fn run_one(
    store: &dyn Store,
    http: &reqwest::Client,
    ctx: CancellationToken,
    updater: &dyn Updater,
    previous: Option<&Fingerprint>,
) -> Result<(), UpdaterPipelineError> {
    let spool = tempfile::NamedTempFile::new().map_err(UpdaterError::from)?;
    let writer_file = spool.reopen().map_err(UpdaterError::from)?;
    let mut zip = ZipWriter::new(writer_file);

    let outcome = updater.fetch(ctx.clone(), previous, &mut zip, http).await?;
    zip.finish().map_err(UpdaterError::from)?;

    let fingerprint = match outcome {
        FetchOutcome::Unchanged => return Ok(()),
        FetchOutcome::Updated(fp) => fp,
    };

    let mut reader_file = spool.reopen().map_err(UpdaterError::from)?;
    reader_file.seek(SeekFrom::Start(0)).map_err(UpdaterError::from)?;
    let zip_archive = ZipArchive::new(reader_file).map_err(UpdaterError::from)?;
    let archive = SpooledArchive {
        inner: Mutex::new(zip_archive),
    };

    let reference = uuid::Uuid::new_v4();

    if let Some(parser) = updater.as_vulnerability_parser() {
        let parsed = parser.parse_vulnerability(ctx.clone(), &archive).await?;
        store
            .update_vulnerabilities(reference, &updater.name(), fingerprint.clone(), parsed)
            .await?;
    }

    if let Some(parser) = updater.as_enrichment_parser() {
        let records = parser.parse_enrichment(ctx.clone(), &archive).await?;
        store
            .update_enrichments(reference, &updater.name(), UpdateKind::Enrichment, fingerprint.clone(), records)
            .await?;
    }

    Ok(())
}

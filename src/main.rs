use std::path::PathBuf;
use std::sync::Arc;

use clairctl::app::coalesce::Coalescer;
use clairctl::app::indexer::IndexerController;
use clairctl::app::layer_fetch::LayerFetcher;
use clairctl::app::layer_scan::LayerScanEngine;
use clairctl::app::lock::Lock;
use clairctl::app::matcher::Matcher;
use clairctl::app::scanner::Ecosystem;
use clairctl::app::store::Store;
use clairctl::app::updater::{ConfigBlob, UpdaterFactory, UpdaterPipeline};
use clairctl::domain::manifest::{LayerRef, Manifest};
use clairctl::domain::Digest;
use clairctl::infra::{
    DpkgMatcher, DpkgScanner, HttpLayerFetcher, InMemoryLock, InMemoryStore, OsReleaseScanner, OsvUpdaterFactory,
    StackerCoalescer, TarUnpacker,
};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(version, author, about, long_about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index a container image manifest given as a JSON list of layer URIs.
    Index {
        /// Path to a JSON file: `[{"digest": "sha256:...", "uri": "https://..."}]`
        manifest: PathBuf,
    },
    /// Run every configured updater once.
    Update {
        #[arg(long)]
        strict: bool,
    },
    /// Match an already-indexed manifest's packages against the vulnerability store.
    Match {
        manifest: PathBuf,
    },
}

fn dpkg_ecosystem() -> Arc<Ecosystem> {
    let scanners = vec![clairctl::domain::ScannerMeta::new("dpkg", "1", clairctl::domain::ScannerKind::Package)];
    Arc::new(Ecosystem {
        name: "dpkg".to_string(),
        package_scanners: vec![Arc::new(DpkgScanner)],
        distribution_scanners: vec![Arc::new(OsReleaseScanner)],
        repository_scanners: vec![],
        coalescer: Arc::new(StackerCoalescer::new(scanners)),
    })
}

fn load_manifest(path: &PathBuf) -> std::io::Result<Manifest> {
    #[derive(serde::Deserialize)]
    struct LayerSpec {
        digest: String,
        uri: String,
    }

    let raw = std::fs::read_to_string(path)?;
    let specs: Vec<LayerSpec> = serde_json::from_str(&raw)?;
    let layers = specs
        .into_iter()
        .map(|spec| LayerRef::new(Digest::new(spec.digest), spec.uri))
        .collect();
    Ok(Manifest::new(layers))
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let args = Args::parse();
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());

    match args.command {
        Command::Index { manifest } => {
            let manifest = load_manifest(&manifest)?;
            let ecosystems = vec![dpkg_ecosystem()];
            let layer_scan = Arc::new(LayerScanEngine::new(ecosystems.clone(), store.clone(), 8));
            let fetcher: Arc<dyn LayerFetcher> = Arc::new(HttpLayerFetcher::new(reqwest::Client::new()));
            let controller = IndexerController::new(fetcher, Arc::new(TarUnpacker), layer_scan, ecosystems, store);

            let report = controller.scan(CancellationToken::new(), &manifest).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Update { strict } => {
            let lock: Arc<dyn Lock> = Arc::new(InMemoryLock::new());
            let factories: Vec<Arc<dyn UpdaterFactory>> = vec![Arc::new(OsvUpdaterFactory)];
            let pipeline = UpdaterPipeline::new(store, lock, factories);
            pipeline.run(CancellationToken::new(), &ConfigBlob::default(), strict).await?;
        }
        Command::Match { manifest } => {
            let manifest = load_manifest(&manifest)?;
            let report = store
                .scan_report(&manifest.hash())
                .await?
                .ok_or("manifest has not been indexed yet")?;

            let matcher = Matcher::new(vec![Arc::new(DpkgMatcher)], store);
            let vuln_report = matcher.match_(&report).await?;
            println!("{}", serde_json::to_string_pretty(&vuln_report)?);
        }
    }

    Ok(())
}

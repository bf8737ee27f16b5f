use std::sync::Arc;

use thiserror::Error;

use crate::app::coalesce::Coalescer;
use crate::app::error::{Classify, ErrorKind};
use crate::app::store::Store;
use crate::domain::{Distribution, Layer, Package, Repository, ScannerMeta};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("scanner {scanner} failed on layer {layer}: {message}")]
    Failed {
        scanner: String,
        layer: String,
        message: String,
    },
}

impl Classify for ScanError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Transient
    }
}

/// A read-only view into a layer's unpacked filesystem (§3: "its unpacked
/// content is an abstract filesystem view"). The concrete decoder (tar,
/// squashfs, ...) is out of scope; `infra::layer_fetch` provides a minimal
/// tar-backed implementation sufficient to exercise the pipeline.
pub trait LayerFilesystem: Send + Sync {
    /// Reads a whole file by absolute path (e.g. `/var/lib/dpkg/status`).
    /// Returns `None` if the path is absent from this layer.
    fn read_file(&self, path: &str) -> Option<Vec<u8>>;

    /// Lists every regular-file path present in this layer.
    fn list_files(&self) -> Vec<String>;
}

/// Common identity shared by every scanner kind.
pub trait VersionedScanner: Send + Sync {
    fn meta(&self) -> ScannerMeta;
}

#[async_trait::async_trait]
pub trait PackageScanner: VersionedScanner {
    async fn scan(&self, layer: &Layer, fs: &dyn LayerFilesystem) -> Result<Vec<Package>, ScanError>;
}

#[async_trait::async_trait]
pub trait DistributionScanner: VersionedScanner {
    async fn scan(
        &self,
        layer: &Layer,
        fs: &dyn LayerFilesystem,
    ) -> Result<Option<Distribution>, ScanError>;
}

#[async_trait::async_trait]
pub trait RepositoryScanner: VersionedScanner {
    async fn scan(
        &self,
        layer: &Layer,
        fs: &dyn LayerFilesystem,
    ) -> Result<Vec<Repository>, ScanError>;
}

/// A named group of scanners sharing one [`Coalescer`] (§6.2: "Scanners are
/// grouped into Ecosystems, which also provide a Coalescer").
pub struct Ecosystem {
    pub name: String,
    pub package_scanners: Vec<Arc<dyn PackageScanner>>,
    pub distribution_scanners: Vec<Arc<dyn DistributionScanner>>,
    pub repository_scanners: Vec<Arc<dyn RepositoryScanner>>,
    pub coalescer: Arc<dyn Coalescer>,
}

impl Ecosystem {
    pub fn all_scanner_metas(&self) -> Vec<ScannerMeta> {
        self.package_scanners
            .iter()
            .map(|s| s.meta())
            .chain(self.distribution_scanners.iter().map(|s| s.meta()))
            .chain(self.repository_scanners.iter().map(|s| s.meta()))
            .collect()
    }
}

/// Gives the layer-scan engine and store-facing code a store handle without
/// pulling a concrete adapter into this module.
pub type StoreHandle = Arc<dyn Store>;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Digest, Distribution, Package, PackageId, Repository};

/// States of the indexer FSM. Persisted as part of [`IndexReport`] so
/// that a caller polling a long-running scan can observe partial progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerState {
    CheckManifest,
    FetchLayers,
    ScanLayers,
    Coalesce,
    ScanFinished,
    ScanError,
    Terminal,
}

/// Per-manifest aggregate produced by the indexer.
///
/// Mirrors the shape of the teacher's `domain::scanresult::ScanResult`: an
/// owning aggregate of `HashMap<Id, Value>` maps plus a top-level
/// status/evaluation field, generalized from "one scan result" to the
/// specific maps the spec names (package→layer, package→distribution,
/// package→repository).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexReport {
    pub manifest_hash: Digest,
    pub state: IndexerState,
    pub success: bool,
    pub err: Option<String>,
    pub packages: HashMap<PackageId, Package>,
    pub package_introduced_in: HashMap<PackageId, Digest>,
    pub package_distribution: HashMap<PackageId, Distribution>,
    pub package_repository: HashMap<PackageId, Repository>,
}

impl IndexReport {
    pub fn new(manifest_hash: Digest) -> Self {
        Self {
            manifest_hash,
            state: IndexerState::CheckManifest,
            success: false,
            err: None,
            packages: HashMap::new(),
            package_introduced_in: HashMap::new(),
            package_distribution: HashMap::new(),
            package_repository: HashMap::new(),
        }
    }

    pub fn mark_error(&mut self, err: impl std::fmt::Display) {
        self.state = IndexerState::ScanError;
        self.success = false;
        self.err = Some(err.to_string());
    }

    pub fn mark_finished(&mut self) {
        self.state = IndexerState::ScanFinished;
        self.success = true;
        self.err = None;
    }
}

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Distinguishes a package produced as a build artifact (`Binary`) from the
/// upstream source package it was built from (`Source`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageKind {
    Binary,
    Source,
}

/// Hash algorithm used to compute a [`PackageId`]. Only `Sha256` is
/// implemented today; the enum exists so the store's dedup key can evolve
/// without an on-disk format break (§3: "Identity for deduplication is the
/// tuple (hash_kind, content hash over all identifying fields)").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashKind {
    Sha256,
}

/// Deduplication identity for a [`Package`]: `(hash_kind, content hash)`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageId {
    pub hash_kind: HashKind,
    pub hash: [u8; 32],
}

impl fmt::Debug for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageId({:x?}:{})", self.hash_kind, hex_prefix(&self.hash))
    }
}

fn hex_prefix(bytes: &[u8; 32]) -> String {
    bytes.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// A piece of software discovered by a package scanner.
///
/// `source` forms a DAG, never a cycle: a source package is only ever
/// referenced through an already-constructed `Arc<Package>`, so there is no
/// way to wire up a cycle through the public API.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub kind: PackageKind,
    pub architecture: String,
    pub module: Option<String>,
    pub package_db: String,
    #[serde(skip)]
    pub source: Option<Arc<Package>>,
}

impl Package {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        kind: PackageKind,
        architecture: impl Into<String>,
        module: Option<String>,
        package_db: impl Into<String>,
        source: Option<Arc<Package>>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            kind,
            architecture: architecture.into(),
            module,
            package_db: package_db.into(),
            source,
        }
    }

    /// Computes the deduplication identity over the identifying fields only
    /// (name, version, kind, architecture, module, package_db, and the
    /// source package's own id if present) — never over derived or mutable
    /// state, matching the teacher's `Package` `Hash`/`PartialEq` impls,
    /// which hash identity fields and nothing else.
    pub fn id(&self) -> PackageId {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.version.as_bytes());
        hasher.update(b"\0");
        hasher.update([match self.kind {
            PackageKind::Binary => 0u8,
            PackageKind::Source => 1u8,
        }]);
        hasher.update(self.architecture.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.module.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\0");
        hasher.update(self.package_db.as_bytes());
        if let Some(source) = &self.source {
            hasher.update(b"\0src:");
            hasher.update(source.id().hash);
        }
        PackageId {
            hash_kind: HashKind::Sha256,
            hash: hasher.finalize().into(),
        }
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Package {}

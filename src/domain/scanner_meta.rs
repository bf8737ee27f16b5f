use serde::{Deserialize, Serialize};

/// The three shapes of artifact a scanner can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScannerKind {
    Package,
    Distribution,
    Repository,
}

/// Uniquely identifies a scanner as `(name, version, kind)`. Results from
/// different triples are distinct rows in the store (§3, Scanner).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScannerMeta {
    pub name: String,
    pub version: String,
    pub kind: ScannerKind,
}

impl ScannerMeta {
    pub fn new(name: impl Into<String>, version: impl Into<String>, kind: ScannerKind) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            kind,
        }
    }
}

impl std::fmt::Display for ScannerMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{:?}", self.name, self.version, self.kind)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The feed domain an [`UpdateOperation`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateKind {
    Vulnerability,
    Enrichment,
}

/// An opaque token representing the version of a feed on the remote side.
///
/// The pipeline treats this as opaque: it may be an ETag, a
/// `Last-Modified` header, or a content hash — whatever the updater chooses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint(pub Vec<u8>);

impl Fingerprint {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }
}

/// An atomic snapshot of one updater's feed ingest.
///
/// `UpdateOperation.ref` (here `reference`) is globally unique (I5); the
/// store rejects a reused ref with `ErrDuplicateRef`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateOperation {
    pub reference: Uuid,
    pub updater: String,
    pub fingerprint: Fingerprint,
    pub timestamp: DateTime<Utc>,
    pub kind: UpdateKind,
}

impl UpdateOperation {
    pub fn new(updater: impl Into<String>, fingerprint: Fingerprint, kind: UpdateKind) -> Self {
        Self {
            reference: Uuid::new_v4(),
            updater: updater.into(),
            fingerprint,
            timestamp: Utc::now(),
            kind,
        }
    }
}

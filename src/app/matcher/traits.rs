use thiserror::Error;

use crate::app::error::{Classify, ErrorKind};
use crate::app::store::{MatchConstraint, MatchQueryRecord, MatchResults};
use crate::app::updater::ConfigBlob;
use crate::domain::Vulnerability;

/// Whether a package's version string could be parsed into something a
/// matcher can compare against a fixed-in range (§4.5 step 1: "those whose
/// `NormalizedVersion.Kind` is the unmatchable sentinel" are dropped before
/// any matcher sees them).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionKind {
    Valid,
    Unmatchable,
}

#[derive(Clone, Debug)]
pub struct NormalizedVersion {
    pub kind: VersionKind,
    pub raw: String,
}

/// Parses `raw` with `semver`, falling back to the unmatchable sentinel
/// rather than failing the whole match run — one unparsable package must not
/// block every other candidate.
pub fn normalize(raw: &str) -> NormalizedVersion {
    match semver::Version::parse(raw) {
        Ok(_) => NormalizedVersion {
            kind: VersionKind::Valid,
            raw: raw.to_string(),
        },
        Err(_) => NormalizedVersion {
            kind: VersionKind::Unmatchable,
            raw: raw.to_string(),
        },
    }
}

#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("matcher {matcher} failed: {message}")]
    Failed { matcher: String, message: String },

    #[error("matcher {matcher} timed out")]
    TimedOut { matcher: String },

    #[error("store error: {0}")]
    Store(#[from] crate::app::store::StoreError),
}

impl Classify for MatcherError {
    fn kind(&self) -> ErrorKind {
        match self {
            MatcherError::Failed { .. } => ErrorKind::Transient,
            MatcherError::TimedOut { .. } => ErrorKind::Transient,
            MatcherError::Store(e) => e.kind(),
        }
    }
}

/// Optional capability: a matcher that delegates to a remote service
/// instead of querying the local store. Its errors are always swallowed into
/// an empty result with a log (§4.5 step 2) — never propagated to the caller.
#[async_trait::async_trait]
pub trait RemoteMatcher: Send + Sync {
    async fn remote_match(&self, records: &[MatchQueryRecord]) -> Result<MatchResults, MatcherError>;
}

/// Optional capability: a matcher whose candidates should be filtered by the
/// store itself rather than locally via `vulnerable()` (§4.5 step 3).
pub trait VersionFilter: Send + Sync {
    /// If `true`, the store's result is final and `vulnerable()` is never
    /// called post-query.
    fn version_authoritative(&self) -> bool {
        false
    }
}

/// Optional capability: a matcher with its own configuration schema, mirrors
/// `UpdaterFactory::create`'s `configUnmarshaler` idiom.
pub trait Configurable: Send + Sync {
    fn configure(&mut self, config: &ConfigBlob) -> Result<(), MatcherError>;
}

/// C6 plugin contract.
#[async_trait::async_trait]
pub trait MatcherPlugin: Send + Sync {
    fn name(&self) -> String;

    /// Drops index records this matcher has no opinion about, before the
    /// engine even considers querying the store on its behalf.
    fn filter(&self, record: &MatchQueryRecord) -> bool;

    /// Which fields of a [`MatchQueryRecord`] the store should equi-join on.
    fn query(&self) -> Vec<MatchConstraint>;

    /// Applied to each store-returned candidate unless `VersionFilter` is
    /// both present and authoritative.
    async fn vulnerable(&self, record: &MatchQueryRecord, vuln: &Vulnerability) -> bool;

    fn as_remote_matcher(&self) -> Option<&dyn RemoteMatcher> {
        None
    }

    fn as_version_filter(&self) -> Option<&dyn VersionFilter> {
        None
    }
}

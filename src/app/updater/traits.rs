use std::fs::File;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use zip::ZipWriter;

use crate::app::error::{Classify, ErrorKind};
use crate::app::store::ParsedVulnerabilities;
use crate::domain::update_operation::Fingerprint;
use crate::domain::EnrichmentRecord;

/// Configuration blob handed to `UpdaterFactory::create`: "a function
/// that takes an arbitrary destination and populates it from a
/// configuration blob". Represented as a thin wrapper over a JSON value so
/// each updater documents and deserializes its own schema with `serde`.
#[derive(Clone, Debug, Default)]
pub struct ConfigBlob(pub serde_json::Value);

impl ConfigBlob {
    pub fn unmarshal<T: DeserializeOwned + Default>(&self) -> Result<T, serde_json::Error> {
        if self.0.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.0.clone())
    }
}

/// What `Fetch` returns: either a fresh snapshot was written, or the feed is
/// unchanged since `previous` and the remaining steps should short-circuit
/// (§4.3 step 3, P4).
#[derive(Debug)]
pub enum FetchOutcome {
    Unchanged,
    Updated(Fingerprint),
}

#[derive(Error, Debug)]
pub enum UpdaterError {
    #[error("http error fetching feed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error spooling feed: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("error parsing feed: {0}")]
    Parse(String),

    #[error("updater contributes nothing: implements neither ParseVulnerability nor ParseEnrichment")]
    NoParser,
}

impl Classify for UpdaterError {
    fn kind(&self) -> ErrorKind {
        match self {
            UpdaterError::Http(_) => ErrorKind::Transient,
            UpdaterError::Io(_) | UpdaterError::Zip(_) => ErrorKind::Internal,
            UpdaterError::Parse(_) => ErrorKind::Permanent,
            UpdaterError::NoParser => ErrorKind::Precondition,
        }
    }
}

/// A read-only view into the inner zip an updater's `Fetch` wrote, opened
/// for `ParseVulnerability`/`ParseEnrichment` (§4.3 step 4).
pub trait FeedArchive: Send + Sync {
    fn read(&self, path: &str) -> Option<Vec<u8>>;
    fn list(&self) -> Vec<String>;
}

/// Optional capability: an updater that can turn a fetched archive into
/// vulnerability rows.
#[async_trait::async_trait]
pub trait VulnerabilityParser: Send + Sync {
    async fn parse_vulnerability(
        &self,
        ctx: CancellationToken,
        archive: &dyn FeedArchive,
    ) -> Result<ParsedVulnerabilities, UpdaterError>;
}

/// Optional capability: an updater that can turn a fetched archive into
/// enrichment records.
#[async_trait::async_trait]
pub trait EnrichmentParser: Send + Sync {
    async fn parse_enrichment(
        &self,
        ctx: CancellationToken,
        archive: &dyn FeedArchive,
    ) -> Result<Vec<EnrichmentRecord>, UpdaterError>;
}

/// One configured feed ingest. `name()` must not contain `/`;
/// duplicates across factories are dropped with a log (enforced by
/// `UpdaterPipeline::collect_updaters`, not by this trait).
#[async_trait::async_trait]
pub trait Updater: Send + Sync {
    fn name(&self) -> String;

    /// Writes the feed's contents into `zip`, returning a fresh
    /// [`Fingerprint`] or [`FetchOutcome::Unchanged`] if nothing changed
    /// since `previous` (§4.3 step 3).
    async fn fetch(
        &self,
        ctx: CancellationToken,
        previous: Option<&Fingerprint>,
        zip: &mut ZipWriter<File>,
        http: &reqwest::Client,
    ) -> Result<FetchOutcome, UpdaterError>;

    /// Capability accessor (§9 "Dynamic dispatch via capability
    /// interfaces"). `None` means this updater does not parse
    /// vulnerabilities.
    fn as_vulnerability_parser(&self) -> Option<&dyn VulnerabilityParser> {
        None
    }

    /// `None` means this updater does not parse enrichments.
    fn as_enrichment_parser(&self) -> Option<&dyn EnrichmentParser> {
        None
    }

    /// Implementing neither parser is an error: the updater
    /// contributes nothing.
    fn validate_contributes_something(&self) -> Result<(), UpdaterError> {
        if self.as_vulnerability_parser().is_none() && self.as_enrichment_parser().is_none() {
            Err(UpdaterError::NoParser)
        } else {
            Ok(())
        }
    }
}

/// C7 factory contract.
#[async_trait::async_trait]
pub trait UpdaterFactory: Send + Sync {
    fn name(&self) -> String;
    async fn create(&self, ctx: CancellationToken, config: &ConfigBlob) -> Vec<Arc<dyn Updater>>;
}

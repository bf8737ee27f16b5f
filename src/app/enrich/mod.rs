//! enrichment sidecar fan-out, invoked from `Matcher::enriched_match`
//! only (§4.5, §4.7's closing note: "Enrichment subsystem folds into
//! `app::enrich::Enricher` plus `enriched_match`'s sidecar fan-out").

use thiserror::Error;

use crate::app::error::{Classify, ErrorKind};
use crate::domain::{EnrichmentRecord, VulnerabilityReport};

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("enricher {enricher} failed: {message}")]
    Failed { enricher: String, message: String },
}

impl Classify for EnrichError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Transient
    }
}

/// An enrichment source consulted after a successful `enriched_match`. Its
/// errors never fail the overall match (§4.5: "never returns enricher
/// errors; they are logged and that enrichment is skipped").
#[async_trait::async_trait]
pub trait Enricher: Send + Sync {
    fn name(&self) -> String;

    async fn enrich(
        &self,
        ctx: tokio_util::sync::CancellationToken,
        report: &VulnerabilityReport,
    ) -> Result<Vec<EnrichmentRecord>, EnrichError>;
}

//! Updater pipeline.

pub mod pipeline;
pub mod traits;

pub use pipeline::{UpdaterPipelineError, UpdaterPipeline};
pub use traits::{
    ConfigBlob, EnrichmentParser, FeedArchive, FetchOutcome, Updater, UpdaterError, UpdaterFactory, VulnerabilityParser,
};

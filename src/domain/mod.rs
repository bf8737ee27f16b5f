//! Plain data model for the indexer and matcher subsystems.
//!
//! Everything in this module is an inert value type: no I/O, no async, no
//! locking. Mutable shared state (the store, the lock service) lives in
//! `app`/`infra`; `domain` only describes what gets persisted and exchanged.

pub mod digest;
pub mod distribution;
pub mod enrichment;
pub mod index_report;
pub mod layer;
pub mod manifest;
pub mod package;
pub mod repository;
pub mod scanner_meta;
pub mod severity;
pub mod update_operation;
pub mod vulnerability;
pub mod vulnerability_report;

pub use digest::Digest;
pub use distribution::Distribution;
pub use enrichment::EnrichmentRecord;
pub use index_report::{IndexReport, IndexerState};
pub use layer::Layer;
pub use manifest::Manifest;
pub use package::{Package, PackageId, PackageKind};
pub use repository::Repository;
pub use scanner_meta::{ScannerKind, ScannerMeta};
pub use severity::Severity;
pub use update_operation::{UpdateKind, UpdateOperation};
pub use vulnerability::{ArchOp, Vulnerability, VulnerabilityId};
pub use vulnerability_report::VulnerabilityReport;

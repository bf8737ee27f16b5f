//! bounded-parallel execution of each `(layer, scanner)` pair.

pub mod engine;

pub use engine::{LayerScanEngine, LayerScanError, ScannedLayer};

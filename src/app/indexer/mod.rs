//! the per-manifest indexer FSM.

pub mod controller;

pub use controller::{reduce, IndexerController, IndexerError};

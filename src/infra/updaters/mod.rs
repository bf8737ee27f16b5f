//! Worked updater example.

pub mod osv;

pub use osv::{OsvConfig, OsvUpdater, OsvUpdaterFactory};

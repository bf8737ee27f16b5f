//! Offline updater archive format.

pub mod offline_archive;

pub use offline_archive::{OfflineArchiveError, OfflineExport, OfflineUpdaterEntry};

//! Adapters implementing the `app` ports: everything outside the hard core
//! that talks to the filesystem, the network, or an in-process substitute
//! for a real database.

pub mod coalescer;
pub mod http_layer_fetcher;
pub mod lock;
pub mod matchers;
pub mod scanners;
pub mod store;
pub mod tar_layer_filesystem;
pub mod updater;
pub mod updaters;

pub use coalescer::StackerCoalescer;
pub use http_layer_fetcher::HttpLayerFetcher;
pub use lock::InMemoryLock;
pub use matchers::DpkgMatcher;
pub use scanners::{DpkgScanner, OsReleaseScanner};
pub use store::InMemoryStore;
pub use tar_layer_filesystem::{TarLayerFilesystem, TarUnpacker};
pub use updaters::{OsvConfig, OsvUpdater, OsvUpdaterFactory};

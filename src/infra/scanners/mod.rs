//! Worked scanner examples: one distribution scanner, one package
//! scanner, enough to exercise the whole indexer pipeline end to end.

pub mod dpkg;
pub mod os_release;

pub use dpkg::DpkgScanner;
pub use os_release::OsReleaseScanner;

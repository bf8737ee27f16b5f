//! Worked matcher example (§6.3, S4).

pub mod dpkg_matcher;

pub use dpkg_matcher::DpkgMatcher;

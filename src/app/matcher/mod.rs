//! Matcher.

pub mod engine;
pub mod traits;

pub use engine::{JoinedMatcherError, Matcher};
pub use traits::{
    normalize, Configurable, MatcherError, MatcherPlugin, NormalizedVersion, RemoteMatcher, VersionFilter, VersionKind,
};

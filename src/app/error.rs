//! Error taxonomy shared across every port boundary.
//!
//! Every subsystem-specific `thiserror` enum (e.g. `StoreError`,
//! `UpdaterError`, `LayerScanError`) implements [`Classify`] so callers can
//! branch on retryability without matching each concrete enum — the same
//! "one extra trait over many thiserror enums" idiom the teacher would reach
//! for, generalizing how each of its adapters (`ComponentFactoryError`,
//! `SysdigImageScannerError`, `DockerImageBuilderError`) already wraps a
//! lower-level cause with `#[from]` plus a descriptive `#[error("...")]`.

use std::fmt;

/// Tags crossing subsystem boundaries: `Transient` may be retried,
/// `Permanent` must not, `VersionDependent` means "retry after a code
/// update", `Precondition` signals caller misuse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Internal,
    Precondition,
    Transient,
    Permanent,
    VersionDependent,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Internal => "internal",
            ErrorKind::Precondition => "precondition",
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
            ErrorKind::VersionDependent => "version-dependent",
        };
        f.write_str(s)
    }
}

/// Implemented by every engine error enum so callers can ask "is this worth
/// retrying?" without a `match` over every concrete type.
pub trait Classify {
    fn kind(&self) -> ErrorKind;

    fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }
}

use thiserror::Error;
use uuid::Uuid;

use crate::app::error::{Classify, ErrorKind};

/// Errors surfaced by the store port.
///
/// `DuplicateRef` is a dedicated sentinel variant: callers distinguish it
/// with `matches!(err, StoreError::DuplicateRef(_))`
/// rather than string-matching a message, the same "dedicated sentinel
/// variant" idiom the teacher uses for
/// `ComponentFactoryError::ConfigurationNotProvided`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("update operation ref {0} already exists")]
    DuplicateRef(Uuid),

    #[error("manifest {0} has no persisted scan report")]
    ReportNotFound(String),

    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("store invariant violated: {0}")]
    Internal(String),
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::DuplicateRef(_) => ErrorKind::Precondition,
            StoreError::ReportNotFound(_) => ErrorKind::Precondition,
            StoreError::Transient(_) => ErrorKind::Transient,
            StoreError::Internal(_) => ErrorKind::Internal,
        }
    }
}

//! Sync Error Types
//!
//! Only failures that end a run (or a catalog call) are errors. Per-source
//! and per-manga failures during a run end up in the
//! [`SyncReport`](crate::SyncReport) instead.

use crate::report::FailureKind;
use derive_more::{Display, Error};
use hondana_extension::capability::error::{Error as CapabilityError, ErrorKind as CapabilityErrorKind};
use hondana_extension::error::{Error as ExtensionError, ErrorKind as ExtensionErrorKind};
use hondana_graph::error::{Error as GraphError, ErrorKind as GraphErrorKind};

/// A synchronization error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Persisting to the content graph (or reading the descriptor store)
    /// failed. Work committed before the failure stays committed.
    #[display("content store failure")]
    Store,
    #[display("a sync run is already in progress")]
    AlreadyRunning,
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    #[display("source failure: {_0}")]
    Source(#[error(not(source))] FailureKind),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store | Self::AlreadyRunning => true,
            Self::Source(kind) => kind.is_retryable(),
            Self::NotFound(_) => false,
        }
    }
}

pub(crate) fn graph(err: GraphError) -> Error {
    let kind = match &*err {
        GraphErrorKind::NotFound(what) => ErrorKind::NotFound(what.clone()),
        _ => ErrorKind::Store,
    };
    err.raise(kind)
}

pub(crate) fn resolve(err: ExtensionError) -> Error {
    let kind = match &*err {
        ExtensionErrorKind::StoreUnavailable => ErrorKind::Store,
        kind => ErrorKind::Source(FailureKind::from_resolve(kind)),
    };
    err.raise(kind)
}

pub(crate) fn capability(err: CapabilityError) -> Error {
    let kind = match &*err {
        CapabilityErrorKind::NotFound(what) => ErrorKind::NotFound(what.clone()),
        kind => ErrorKind::Source(FailureKind::from(kind)),
    };
    err.raise(kind)
}

//! Extension Error Types
//!
//! Errors raised by the descriptor store, the extension repository client and
//! the loader. Errors raised *by* a source while it is being invoked live in
//! [`capability::error`](crate::capability::error) instead.

use derive_more::{Display, Error};
use semver::Version;

/// An extension registry error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extension registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No descriptor is stored for the key (or no manifest entry exists for it).
    #[display("extension not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The backing store could not be reached. Transient; distinct from
    /// [`NotFound`](Self::NotFound).
    #[display("extension store unavailable")]
    StoreUnavailable,
    /// The package doesn't satisfy the source capability contract.
    #[display("incompatible extension: {_0}")]
    IncompatibleExtension(#[error(not(source))] String),
    /// The remote extension repository could not be reached, or served
    /// something other than what its manifest promised.
    #[display("failed to fetch from the extension repository")]
    FetchFailed,
    /// A newer version of the extension is already installed.
    #[display("extension {key} is already installed at version {installed}")]
    AlreadyInstalled { key: String, installed: Version },
    /// The source has no installed (or no loadable) extension.
    #[display("extension not installed: {_0}")]
    NotInstalled(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable | Self::FetchFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        let err = ErrorKind::AlreadyInstalled {
            key: "alpha".to_string(),
            installed: Version::new(1, 2, 0),
        };
        assert_eq!(err.to_string(), "extension alpha is already installed at version 1.2.0");
        assert_eq!(ErrorKind::NotInstalled("beta".to_string()).to_string(), "extension not installed: beta");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::StoreUnavailable.is_retryable());
        assert!(!ErrorKind::NotFound("alpha".to_string()).is_retryable());
        assert!(!ErrorKind::IncompatibleExtension("no key".to_string()).is_retryable());
    }
}

//! Relay Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A relay error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No active source with that key.
    #[display("unknown source: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Only absolute `http`/`https` URLs are relayed.
    #[display("invalid target URL")]
    InvalidUrl,
    /// The source's header policy can't be turned into request headers.
    #[display("invalid header in source policy: {_0}")]
    InvalidPolicy(#[error(not(source))] String),
    /// The origin could not be reached, or the body stream broke off.
    #[display("source unreachable")]
    SourceUnreachable,
    #[display("descriptor store unavailable")]
    StoreUnavailable,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceUnreachable | Self::StoreUnavailable)
    }
}

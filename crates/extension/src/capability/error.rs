//! Capability Error Types
//!
//! The complete set of failures a source is allowed to surface. Anything
//! else coming out of an extension is a defect in that extension, and the
//! runtimes fold it into one of these kinds.

use derive_more::{Display, Error};

/// A source invocation error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for source invocations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network-level failure, or the call timed out.
    #[display("source unreachable")]
    SourceUnreachable,
    /// The provider answered, but not in the shape the extension expects.
    #[display("source protocol error")]
    SourceProtocolError,
    /// The provider asked us to back off. Do not retry immediately.
    #[display("rate limited by source")]
    RateLimited,
    /// The requested manga doesn't exist on the provider. Only
    /// `manga_detail` fails with this; a missing listing is a protocol error.
    #[display("not found on source: {_0}")]
    NotFound(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying (later) might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceUnreachable | Self::RateLimited)
    }
}

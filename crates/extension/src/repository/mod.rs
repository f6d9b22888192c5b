//! Remote extension repository client.

mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

use crate::error::Result;
use crate::manifest::ManifestEntry;
use async_trait::async_trait;
use std::sync::Arc;

pub use crate::repository::http::HttpRepository;
#[cfg(any(test, feature = "mock"))]
pub use crate::repository::mock::StaticRepository;

pub type RepositoryHandle = Arc<dyn ExtensionRepository>;

/// Where installable extensions come from.
///
/// Both operations fail with
/// [`ErrorKind::FetchFailed`](crate::error::ErrorKind::FetchFailed) when the
/// repository can't be reached.
#[async_trait]
pub trait ExtensionRepository: Send + Sync {
    /// Every extension the repository currently offers.
    async fn manifest(&self) -> Result<Vec<ManifestEntry>>;

    /// Raw package bytes for a manifest entry.
    async fn package(&self, entry: &ManifestEntry) -> Result<Vec<u8>>;
}

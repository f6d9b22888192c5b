//! The source capability contract.
//!
//! Every installed extension, whatever it runs on, is driven through
//! [`SourceCapability`]. The runtime variants in this module adapt a
//! [`Runtime`](crate::Runtime) to the trait; callers never see the difference.

pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod native;
mod rpc;
mod subprocess;

use crate::capability::error::Result;
use crate::models::{ChapterSummary, ListQuery, MangaDetail, MangaSummary, PageRef};
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(any(test, feature = "mock"))]
pub use crate::capability::mock::{ScriptedSource, StaticResolver};
pub use crate::capability::native::{NativeFactory, NativeRegistry};
pub use crate::capability::rpc::RpcSource;
pub use crate::capability::subprocess::{ENDPOINT_ENV, SubprocessSource};

/// Shared handle to a loaded source.
pub type CapabilityHandle = Arc<dyn SourceCapability>;

/// Operations every source must implement.
///
/// Implementations may only fail with the kinds in
/// [`capability::error::ErrorKind`](crate::capability::error::ErrorKind).
/// An empty result is never an error.
#[async_trait]
pub trait SourceCapability: Send + Sync {
    /// Key of the source this capability serves.
    fn key(&self) -> &str;

    /// One page of the source's catalog, in the provider's order.
    async fn list_manga(&self, query: &ListQuery) -> Result<Vec<MangaSummary>>;

    async fn manga_detail(&self, manga_id: &str) -> Result<MangaDetail>;

    /// Chapters of a manga in the provider's natural order.
    async fn chapter_list(&self, manga_id: &str) -> Result<Vec<ChapterSummary>>;

    async fn page_list(&self, manga_id: &str, chapter_id: &str) -> Result<Vec<PageRef>>;
}

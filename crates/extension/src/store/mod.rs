//! Descriptor Store
//!
//! The canonical record of installed extensions. Implementations only touch
//! their backing store: no network access, no loading.

#[cfg(any(test, feature = "mock"))]
mod memory;

use crate::descriptor::{ExtensionDescriptor, InstallState};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(any(test, feature = "mock"))]
pub use crate::store::memory::MemoryStore;

pub type StoreHandle = Arc<dyn DescriptorStore>;

/// Persistence contract for extension descriptors.
///
/// Failing to reach the backing store must surface as
/// [`ErrorKind::StoreUnavailable`](crate::error::ErrorKind::StoreUnavailable),
/// never as `NotFound`.
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    /// Descriptors of every active (not disabled) source, ordered by key.
    async fn list(&self) -> Result<Vec<ExtensionDescriptor>>;

    /// Descriptor of an active source, or `NotFound`.
    async fn get(&self, key: &str) -> Result<ExtensionDescriptor>;

    /// Insert or replace a descriptor and mark the source installed.
    async fn upsert(&self, descriptor: &ExtensionDescriptor) -> Result<()>;

    /// Soft-disable a source. Removing an unknown or already disabled key
    /// is a no-op.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Change the install state of a known source, or `NotFound`.
    async fn set_state(&self, key: &str, state: InstallState) -> Result<()>;
}

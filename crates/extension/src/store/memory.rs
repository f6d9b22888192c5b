//! In-memory descriptor store for testing.

use crate::descriptor::{ExtensionDescriptor, InstallState};
use crate::error::{ErrorKind, Result};
use crate::store::DescriptorStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Descriptors kept in a `BTreeMap` behind a [`RwLock`].
///
/// [`MemoryStore::set_unavailable`] makes every call fail with
/// [`ErrorKind::StoreUnavailable`], to exercise outage paths.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, (ExtensionDescriptor, InstallState)>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_descriptors(descriptors: impl IntoIterator<Item = ExtensionDescriptor>) -> Self {
        let entries = descriptors
            .into_iter()
            .map(|descriptor| (descriptor.key.clone(), (descriptor, InstallState::Installed)))
            .collect();
        Self {
            entries: RwLock::new(entries),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Install state of a key, including disabled sources.
    pub async fn state(&self, key: &str) -> Option<InstallState> {
        self.entries.read().await.get(key).map(|(_, state)| *state)
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::StoreUnavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl DescriptorStore for MemoryStore {
    async fn list(&self) -> Result<Vec<ExtensionDescriptor>> {
        self.check()?;
        let entries = self.entries.read().await;
        Ok(entries.values().filter(|(_, state)| state.is_active()).map(|(d, _)| d.clone()).collect())
    }

    async fn get(&self, key: &str) -> Result<ExtensionDescriptor> {
        self.check()?;
        match self.entries.read().await.get(key) {
            Some((descriptor, state)) if state.is_active() => Ok(descriptor.clone()),
            _ => exn::bail!(ErrorKind::NotFound(key.to_string())),
        }
    }

    async fn upsert(&self, descriptor: &ExtensionDescriptor) -> Result<()> {
        self.check()?;
        let mut entries = self.entries.write().await;
        entries.insert(descriptor.key.clone(), (descriptor.clone(), InstallState::Installed));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check()?;
        if let Some((_, state)) = self.entries.write().await.get_mut(key) {
            *state = InstallState::Disabled;
        }
        Ok(())
    }

    async fn set_state(&self, key: &str, state: InstallState) -> Result<()> {
        self.check()?;
        match self.entries.write().await.get_mut(key) {
            Some((_, current)) => {
                *current = state;
                Ok(())
            },
            None => exn::bail!(ErrorKind::NotFound(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{HeaderPolicy, Runtime};
    use semver::Version;

    fn descriptor(key: &str) -> ExtensionDescriptor {
        ExtensionDescriptor {
            key: key.to_string(),
            name: key.to_uppercase(),
            version: Version::new(1, 0, 0),
            lib_version: Version::new(1, 0, 0),
            endpoint: format!("https://{key}.example"),
            headers: HeaderPolicy::default(),
            runtime: Runtime::Native { module: key.to_string() },
            icon: None,
        }
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get("alpha").await.unwrap_err();
        assert_eq!(*err, ErrorKind::NotFound("alpha".to_string()));
    }

    #[tokio::test]
    async fn test_unavailable_is_distinct_from_not_found() {
        let store = MemoryStore::with_descriptors([descriptor("alpha")]);
        store.set_unavailable(true);
        assert_eq!(*store.get("alpha").await.unwrap_err(), ErrorKind::StoreUnavailable);
        assert_eq!(*store.list().await.unwrap_err(), ErrorKind::StoreUnavailable);
        store.set_unavailable(false);
        assert_eq!(store.get("alpha").await.unwrap().key, "alpha");
    }

    #[tokio::test]
    async fn test_remove_disables_and_is_idempotent() {
        let store = MemoryStore::with_descriptors([descriptor("alpha"), descriptor("beta")]);
        store.remove("alpha").await.unwrap();
        store.remove("alpha").await.unwrap();
        store.remove("never-installed").await.unwrap();
        assert_eq!(store.state("alpha").await, Some(InstallState::Disabled));
        let keys: Vec<_> = store.list().await.unwrap().into_iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["beta"]);
        // Reinstalling re-activates the source.
        store.upsert(&descriptor("alpha")).await.unwrap();
        assert_eq!(store.state("alpha").await, Some(InstallState::Installed));
    }

    #[tokio::test]
    async fn test_set_state_unknown_key() {
        let store = MemoryStore::new();
        let err = store.set_state("alpha", InstallState::UpdateAvailable).await.unwrap_err();
        assert!(matches!(*err, ErrorKind::NotFound(_)));
    }
}

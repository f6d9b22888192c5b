//! In-memory extension repository for testing.

use crate::error::{ErrorKind, Result};
use crate::manifest::{ExtensionPackage, ManifestEntry};
use crate::repository::ExtensionRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// A repository whose manifest and packages are published by the test.
///
/// Publishing a newer version of a key replaces the older manifest entry,
/// like a real repository would.
#[derive(Default)]
pub struct StaticRepository {
    entries: RwLock<Vec<ManifestEntry>>,
    packages: RwLock<HashMap<String, Vec<u8>>>,
    offline: AtomicBool,
}

impl StaticRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize and publish a package, returning its manifest entry
    /// (with checksum).
    pub async fn publish(&self, package: &ExtensionPackage) -> ManifestEntry {
        let bytes = serde_json::to_vec(package).expect("StaticRepository::publish: package must serialize");
        let entry = ManifestEntry {
            key: package.key.clone(),
            name: package.name.clone(),
            version: package.version.clone(),
            lib_version: package.lib_version.clone(),
            package: format!("{}-{}.json", package.key, package.version),
            checksum: Some(blake3::hash(&bytes).to_hex().to_string()),
            icon: package.icon.clone(),
        };
        self.publish_raw(entry.clone(), bytes).await;
        entry
    }

    /// Publish arbitrary bytes under an entry, checksum untouched.
    pub async fn publish_raw(&self, entry: ManifestEntry, bytes: Vec<u8>) {
        self.packages.write().await.insert(entry.package.clone(), bytes);
        let mut entries = self.entries.write().await;
        entries.retain(|existing| existing.key != entry.key);
        entries.push(entry);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::FetchFailed);
        }
        Ok(())
    }
}

#[async_trait]
impl ExtensionRepository for StaticRepository {
    async fn manifest(&self) -> Result<Vec<ManifestEntry>> {
        self.check()?;
        Ok(self.entries.read().await.clone())
    }

    async fn package(&self, entry: &ManifestEntry) -> Result<Vec<u8>> {
        self.check()?;
        match self.packages.read().await.get(&entry.package) {
            Some(bytes) => Ok(bytes.clone()),
            None => exn::bail!(ErrorKind::FetchFailed),
        }
    }
}

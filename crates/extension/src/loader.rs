use crate::capability::{CapabilityHandle, NativeRegistry, RpcSource, SubprocessSource};
use crate::descriptor::{ExtensionDescriptor, InstallState, Runtime};
use crate::error::{ErrorKind, Result};
use crate::manifest::{ExtensionPackage, ManifestEntry};
use crate::repository::RepositoryHandle;
use crate::store::StoreHandle;
use async_trait::async_trait;
use exn::OptionExt;
use hondana_asyncutils::KeyedMutex;
use semver::Version;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

pub type ResolverHandle = Arc<dyn Resolver>;

/// Anything that can turn a source key into a callable source.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// The loaded capability for `key`, or
    /// [`ErrorKind::NotInstalled`].
    async fn resolve(&self, key: &str) -> Result<CapabilityHandle>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    Updated { previous: Version },
    /// The same version was already installed.
    Unchanged,
}

/// A remote manifest entry, joined with what is installed locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub entry: ManifestEntry,
    pub state: InstallState,
    pub installed: Option<Version>,
}

/// Installs, updates and removes extensions, and keeps the loaded ones.
///
/// Installs of the same key are serialized with a [`KeyedMutex`]; nothing
/// an install holds blocks [`resolve`](Resolver::resolve) of another key.
/// The `loaded` map is only locked for the instant of a lookup or insert,
/// never across a fetch.
pub struct Loader {
    store: StoreHandle,
    repository: RepositoryHandle,
    natives: NativeRegistry,
    http: reqwest::Client,
    loaded: RwLock<HashMap<String, CapabilityHandle>>,
    installing: KeyedMutex<String>,
}

impl Loader {
    pub fn new(store: StoreHandle, repository: RepositoryHandle, natives: NativeRegistry) -> Self {
        Self {
            store,
            repository,
            natives,
            http: reqwest::Client::new(),
            loaded: RwLock::new(HashMap::new()),
            installing: KeyedMutex::new(),
        }
    }

    /// Client used by RPC sources.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Eagerly load every installed extension. Extensions that can't be
    /// loaded are logged and skipped; they'll fail again at resolve time.
    #[instrument(skip(self))]
    pub async fn load_installed(&self) -> Result<usize> {
        let mut count = 0;
        for descriptor in self.store.list().await? {
            match self.instantiate(&descriptor) {
                Ok(capability) => {
                    self.loaded.write().await.insert(descriptor.key.clone(), capability);
                    count += 1;
                },
                Err(err) => tracing::warn!(key = %descriptor.key, error = ?err, "Skipping unloadable extension"),
            }
        }
        tracing::info!(count, "Loaded installed extensions");
        Ok(count)
    }

    /// Every extension the repository offers, with its local install state.
    pub async fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        let manifest = self.repository.manifest().await?;
        let installed: HashMap<String, Version> =
            self.store.list().await?.into_iter().map(|descriptor| (descriptor.key, descriptor.version)).collect();
        Ok(manifest
            .into_iter()
            .map(|entry| {
                let installed = installed.get(&entry.key).cloned();
                let state = match &installed {
                    None => InstallState::Available,
                    Some(version) if *version < entry.version => InstallState::UpdateAvailable,
                    Some(_) => InstallState::Installed,
                };
                CatalogEntry { entry, state, installed }
            })
            .collect())
    }

    /// Mark installed sources with a newer manifest entry as
    /// [`InstallState::UpdateAvailable`]. Returns the affected keys.
    #[instrument(skip(self))]
    pub async fn check_updates(&self) -> Result<Vec<String>> {
        let manifest = self.repository.manifest().await?;
        let mut outdated = Vec::new();
        for descriptor in self.store.list().await? {
            if let Some(entry) = manifest.iter().find(|entry| entry.key == descriptor.key)
                && entry.version > descriptor.version
            {
                self.store.set_state(&descriptor.key, InstallState::UpdateAvailable).await?;
                tracing::info!(key = %descriptor.key, installed = %descriptor.version, available = %entry.version, "Update available");
                outdated.push(descriptor.key);
            }
        }
        Ok(outdated)
    }

    /// Install (or upgrade to) the extension described by a manifest entry.
    ///
    /// Installing the version that is already installed is a no-op; a
    /// downgrade fails with [`ErrorKind::AlreadyInstalled`].
    #[instrument(skip_all, fields(key = %entry.key, version = %entry.version))]
    pub async fn install(&self, entry: &ManifestEntry) -> Result<InstallOutcome> {
        if entry.key.trim().is_empty() {
            exn::bail!(ErrorKind::IncompatibleExtension("manifest entry has an empty source key".to_string()));
        }
        let _guard = self.installing.lock(entry.key.clone()).await;

        let previous = self.installed(&entry.key).await?;
        if let Some(current) = &previous {
            match current.version.cmp(&entry.version) {
                Ordering::Equal => {
                    tracing::debug!("Extension already installed at this version");
                    return Ok(InstallOutcome::Unchanged);
                },
                Ordering::Greater => exn::bail!(ErrorKind::AlreadyInstalled {
                    key: entry.key.clone(),
                    installed: current.version.clone(),
                }),
                Ordering::Less => {},
            }
        }

        let bytes = self.repository.package(entry).await?;
        entry.verify_checksum(&bytes)?;
        let package = ExtensionPackage::parse(&bytes)?;
        package.verify_against(entry)?;
        let descriptor = package.into_descriptor();
        let capability = self.instantiate(&descriptor)?;

        self.store.upsert(&descriptor).await?;
        self.loaded.write().await.insert(descriptor.key.clone(), capability);
        tracing::info!(name = %descriptor.name, "Installed extension");

        Ok(match previous {
            Some(previous) => InstallOutcome::Updated { previous: previous.version },
            None => InstallOutcome::Installed,
        })
    }

    /// Install the latest manifest entry for an installed source.
    #[instrument(skip(self))]
    pub async fn update(&self, key: &str) -> Result<InstallOutcome> {
        let installed = self.installed(key).await?.ok_or_raise(|| ErrorKind::NotInstalled(key.to_string()))?;
        let entry = self
            .repository
            .manifest()
            .await?
            .into_iter()
            .find(|entry| entry.key == key)
            .ok_or_raise(|| ErrorKind::NotFound(key.to_string()))?;
        if entry.version <= installed.version {
            tracing::debug!(version = %installed.version, "Extension is up to date");
            return Ok(InstallOutcome::Unchanged);
        }
        self.install(&entry).await
    }

    /// Disable a source and drop its loaded capability. Stored content is
    /// left untouched.
    #[instrument(skip(self))]
    pub async fn uninstall(&self, key: &str) -> Result<()> {
        let _guard = self.installing.lock(key.to_string()).await;
        if self.installed(key).await?.is_none() {
            exn::bail!(ErrorKind::NotInstalled(key.to_string()));
        }
        self.store.remove(key).await?;
        self.loaded.write().await.remove(key);
        tracing::info!("Uninstalled extension");
        Ok(())
    }

    async fn installed(&self, key: &str) -> Result<Option<ExtensionDescriptor>> {
        match self.store.get(key).await {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(err) if matches!(&*err, ErrorKind::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn instantiate(&self, descriptor: &ExtensionDescriptor) -> Result<CapabilityHandle> {
        Ok(match &descriptor.runtime {
            Runtime::Native { module } => self.natives.instantiate(descriptor).ok_or_raise(|| {
                ErrorKind::IncompatibleExtension(format!("native module `{module}` is not available in this build"))
            })?,
            Runtime::Rpc { url } => {
                Arc::new(RpcSource::new(&descriptor.key, url, &descriptor.headers, self.http.clone())?)
            },
            Runtime::Subprocess { command, args } => Arc::new(SubprocessSource::new(
                &descriptor.key,
                command.clone(),
                args.clone(),
                &descriptor.endpoint,
            )),
        })
    }
}

#[async_trait]
impl Resolver for Loader {
    async fn resolve(&self, key: &str) -> Result<CapabilityHandle> {
        if let Some(capability) = self.loaded.read().await.get(key) {
            return Ok(capability.clone());
        }
        // Serialized with install and uninstall of the same key.
        let _guard = self.installing.lock(key.to_string()).await;
        if let Some(capability) = self.loaded.read().await.get(key) {
            return Ok(capability.clone());
        }
        let descriptor = match self.store.get(key).await {
            Ok(descriptor) => descriptor,
            Err(err) if matches!(&*err, ErrorKind::NotFound(_)) => {
                return Err(err.raise(ErrorKind::NotInstalled(key.to_string())));
            },
            Err(err) => return Err(err),
        };
        let capability = self.instantiate(&descriptor)?;
        self.loaded.write().await.insert(key.to_string(), capability.clone());
        Ok(capability)
    }
}

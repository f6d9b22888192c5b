use crate::descriptor::{ExtensionDescriptor, HeaderPolicy, Runtime};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use semver::Version;
use serde::{Deserialize, Serialize};

/// Version of the source capability contract implemented by this host.
///
/// A package built against `lib_version` is accepted when it is
/// caret-compatible with this version and not newer than it.
pub const CONTRACT_VERSION: Version = Version::new(1, 0, 0);

/// One entry of the remote repository's `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub key: String,
    pub name: String,
    pub version: Version,
    pub lib_version: Version,
    /// Package location, relative to the repository base URL.
    pub package: String,
    /// Lowercase hex BLAKE3 digest of the package bytes.
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl ManifestEntry {
    /// Check downloaded bytes against the advertised checksum, if any.
    pub fn verify_checksum(&self, bytes: &[u8]) -> Result<()> {
        let Some(expected) = &self.checksum else {
            return Ok(());
        };
        let actual = blake3::hash(bytes).to_hex();
        if !actual.as_str().eq_ignore_ascii_case(expected.trim()) {
            tracing::warn!(key = %self.key, expected = %expected, actual = %actual, "Package checksum mismatch");
            exn::bail!(ErrorKind::FetchFailed);
        }
        Ok(())
    }
}

/// The four operations of the source capability contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListManga,
    MangaDetail,
    ChapterList,
    PageList,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Self::ListManga, Self::MangaDetail, Self::ChapterList, Self::PageList];
}

/// An installable extension package, as served by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionPackage {
    pub key: String,
    pub name: String,
    pub version: Version,
    pub lib_version: Version,
    pub endpoint: String,
    #[serde(default)]
    pub headers: HeaderPolicy,
    pub runtime: Runtime,
    /// Operations the extension claims to implement.
    #[serde(default)]
    pub capabilities: Vec<Operation>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl ExtensionPackage {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .or_raise(|| ErrorKind::IncompatibleExtension("package is not a valid extension document".to_string()))
    }

    /// Make sure the package satisfies the capability contract and is the
    /// package the manifest entry described.
    pub fn verify_against(&self, entry: &ManifestEntry) -> Result<()> {
        let incompatible = |reason: String| exn::Exn::from(ErrorKind::IncompatibleExtension(reason));
        if self.key.trim().is_empty() {
            return Err(incompatible("package declares an empty source key".to_string()));
        }
        if self.key != entry.key {
            return Err(incompatible(format!("package key `{}` does not match `{}`", self.key, entry.key)));
        }
        if self.version != entry.version {
            return Err(incompatible(format!(
                "package version {} does not match the advertised {}",
                self.version, entry.version
            )));
        }
        if !is_compatible(&self.lib_version) {
            return Err(incompatible(format!(
                "built against contract {}, host implements {CONTRACT_VERSION}",
                self.lib_version
            )));
        }
        if let Some(missing) = Operation::ALL.iter().find(|op| !self.capabilities.contains(op)) {
            return Err(incompatible(format!("missing capability {missing:?}")));
        }
        Ok(())
    }

    pub fn into_descriptor(self) -> ExtensionDescriptor {
        ExtensionDescriptor {
            key: self.key,
            name: self.name,
            version: self.version,
            lib_version: self.lib_version,
            endpoint: self.endpoint,
            headers: self.headers,
            runtime: self.runtime,
            icon: self.icon,
        }
    }
}

/// Whether an extension built against `lib_version` can be driven by this host.
pub fn is_compatible(lib_version: &Version) -> bool {
    if lib_version.major != CONTRACT_VERSION.major || lib_version > &CONTRACT_VERSION {
        return false;
    }
    // Pre-1.0 contracts break on every minor bump.
    CONTRACT_VERSION.major != 0 || lib_version.minor == CONTRACT_VERSION.minor
}

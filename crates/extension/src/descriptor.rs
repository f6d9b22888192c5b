use derive_more::{Display, Error};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Everything the host knows about an installed extension.
///
/// Descriptors are plain immutable data: loading one never touches the
/// network or spawns anything. Turning a descriptor into something callable
/// is the [`Loader`](crate::Loader)'s job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    /// Provider-assigned source key. Globally unique and immutable once installed.
    pub key: String,
    pub name: String,
    pub version: Version,
    /// Version of the source capability contract the extension was built against.
    pub lib_version: Version,
    /// Base network endpoint of the provider.
    pub endpoint: String,
    /// Header overrides applied to proxied fetches.
    #[serde(default)]
    pub headers: HeaderPolicy,
    pub runtime: Runtime,
    #[serde(default)]
    pub icon: Option<String>,
}

/// How an extension is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Runtime {
    /// Compiled into the host and registered in a [`NativeRegistry`](crate::capability::NativeRegistry).
    Native { module: String },
    /// JSON over HTTP.
    Rpc { url: String },
    /// A local executable, spawned once per call.
    Subprocess {
        command: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Install state of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum InstallState {
    #[display("available")]
    Available,
    #[display("installed")]
    Installed,
    #[display("update-available")]
    UpdateAvailable,
    #[display("disabled")]
    Disabled,
}

#[derive(Debug, Display, Error)]
#[display("unknown install state: {_0}")]
pub struct UnknownInstallState(#[error(not(source))] String);

impl InstallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Installed => "installed",
            Self::UpdateAvailable => "update-available",
            Self::Disabled => "disabled",
        }
    }

    /// Whether the source is usable (its descriptor is live in the store).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Installed | Self::UpdateAvailable)
    }
}

impl FromStr for InstallState {
    type Err = UnknownInstallState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "available" => Self::Available,
            "installed" => Self::Installed,
            "update-available" => Self::UpdateAvailable,
            "disabled" => Self::Disabled,
            other => return Err(UnknownInstallState(other.to_string())),
        })
    }
}

/// Per-source header overrides (`Referer`, `Origin`, `User-Agent`, ...).
///
/// Header names compare case-insensitively. The policy is data only; the
/// relay and the RPC runtime decide when to apply it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderPolicy(BTreeMap<String, String>);

#[derive(Debug, Display, Error)]
#[display("invalid header in policy: {_0}")]
pub struct InvalidHeader(#[error(not(source))] String);

impl InvalidHeader {
    /// Name of the offending header.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl HeaderPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0.retain(|existing, _| !existing.eq_ignore_ascii_case(name.as_ref()));
        self.0.insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert into a [`HeaderMap`], rejecting names or values that aren't
    /// valid HTTP.
    pub fn to_header_map(&self) -> Result<HeaderMap, InvalidHeader> {
        let mut headers = HeaderMap::with_capacity(self.0.len());
        for (name, value) in self.iter() {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|_| InvalidHeader(name.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|_| InvalidHeader(name.to_string()))?;
            headers.insert(header, value);
        }
        Ok(headers)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderPolicy {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut policy = Self::new();
        for (name, value) in iter {
            policy.insert(name, value);
        }
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(InstallState::Available)]
    #[case(InstallState::Installed)]
    #[case(InstallState::UpdateAvailable)]
    #[case(InstallState::Disabled)]
    fn test_install_state_str(#[case] state: InstallState) {
        assert_eq!(state.as_str().parse::<InstallState>().unwrap(), state);
        assert_eq!(state.to_string(), state.as_str());
    }

    #[test]
    fn test_unknown_install_state() {
        assert!("uninstalled".parse::<InstallState>().is_err());
    }

    #[test]
    fn test_header_policy_is_case_insensitive() {
        let policy = HeaderPolicy::new().with("Referer", "https://a.example").with("referer", "https://b.example");
        assert_eq!(policy.len(), 1);
        assert_eq!(policy.get("REFERER"), Some("https://b.example"));
    }

    #[test]
    fn test_header_policy_to_header_map() {
        let policy: HeaderPolicy = [("Referer", "https://alpha.example"), ("User-Agent", "hondana")].into_iter().collect();
        let headers = policy.to_header_map().unwrap();
        assert_eq!(headers.get("referer").unwrap(), "https://alpha.example");
        assert_eq!(headers.get("user-agent").unwrap(), "hondana");
    }

    #[test]
    fn test_header_policy_rejects_invalid_values() {
        let policy = HeaderPolicy::new().with("Referer", "line\nbreak");
        assert!(policy.to_header_map().is_err());
        let policy = HeaderPolicy::new().with("Bad Header", "value");
        assert!(policy.to_header_map().is_err());
    }

    #[test]
    fn test_runtime_serde() {
        let runtime: Runtime = serde_json::from_str(r#"{"kind":"rpc","url":"https://rpc.example"}"#).unwrap();
        assert_eq!(runtime, Runtime::Rpc { url: "https://rpc.example".to_string() });
        let runtime: Runtime = serde_json::from_str(r#"{"kind":"subprocess","command":"/bin/source"}"#).unwrap();
        assert!(matches!(runtime, Runtime::Subprocess { args, .. } if args.is_empty()));
    }
}

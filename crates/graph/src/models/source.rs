use crate::error::{Error, ErrorKind};
use crate::models::from_timestamp;
use exn::ResultExt;
use hondana_extension::{ExtensionDescriptor, InstallState};
use semver::Version;
use time::OffsetDateTime;

/// A registered source: its descriptor plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub descriptor: ExtensionDescriptor,
    pub state: InstallState,
    pub installed_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Source {
    pub fn key(&self) -> &str {
        &self.descriptor.key
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SourceRow {
    pub(crate) key: String,
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) lib_version: String,
    pub(crate) endpoint: String,
    pub(crate) headers: String,
    pub(crate) runtime: String,
    pub(crate) icon: Option<String>,
    pub(crate) state: String,
    pub(crate) installed_at: i64,
    pub(crate) updated_at: i64,
}

impl SourceRow {
    pub(crate) fn from_descriptor(descriptor: &ExtensionDescriptor, now: OffsetDateTime) -> Result<Self, Error> {
        Ok(Self {
            key: descriptor.key.clone(),
            name: descriptor.name.clone(),
            version: descriptor.version.to_string(),
            lib_version: descriptor.lib_version.to_string(),
            endpoint: descriptor.endpoint.clone(),
            headers: serde_json::to_string(&descriptor.headers).or_raise(|| ErrorKind::InvalidData("header policy"))?,
            runtime: serde_json::to_string(&descriptor.runtime).or_raise(|| ErrorKind::InvalidData("runtime"))?,
            icon: descriptor.icon.clone(),
            state: InstallState::Installed.as_str().to_string(),
            installed_at: now.unix_timestamp(),
            updated_at: now.unix_timestamp(),
        })
    }
}

impl TryFrom<SourceRow> for Source {
    type Error = Error;
    fn try_from(row: SourceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            descriptor: ExtensionDescriptor {
                key: row.key,
                name: row.name,
                version: Version::parse(&row.version).or_raise(|| ErrorKind::InvalidData("version"))?,
                lib_version: Version::parse(&row.lib_version).or_raise(|| ErrorKind::InvalidData("lib version"))?,
                endpoint: row.endpoint,
                headers: serde_json::from_str(&row.headers).or_raise(|| ErrorKind::InvalidData("header policy"))?,
                runtime: serde_json::from_str(&row.runtime).or_raise(|| ErrorKind::InvalidData("runtime"))?,
                icon: row.icon,
            },
            state: row.state.parse::<InstallState>().or_raise(|| ErrorKind::InvalidData("install state"))?,
            installed_at: from_timestamp(row.installed_at, "install date")?,
            updated_at: from_timestamp(row.updated_at, "update date")?,
        })
    }
}

use crate::error::{ErrorKind, Result};
use crate::manifest::ManifestEntry;
use crate::repository::ExtensionRepository;
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, Url};
use tracing::instrument;

const MANIFEST_FILE: &str = "index.json";

/// Repository served over HTTP: `<base>/index.json` plus one file per package.
#[derive(Debug, Clone)]
pub struct HttpRepository {
    base: Url,
    client: Client,
}

impl HttpRepository {
    pub fn new(base: &str, client: Client) -> Result<Self> {
        let mut base = Url::parse(base).or_raise(|| ErrorKind::FetchFailed)?;
        // Without a trailing slash, `join` would replace the last segment.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base, client })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        self.base.join(path).or_raise(|| ErrorKind::FetchFailed)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .or_raise(|| ErrorKind::FetchFailed)
    }
}

#[async_trait]
impl ExtensionRepository for HttpRepository {
    #[instrument(skip(self), fields(base = %self.base))]
    async fn manifest(&self) -> Result<Vec<ManifestEntry>> {
        let response = self.get(self.resolve(MANIFEST_FILE)?).await?;
        let entries: Vec<ManifestEntry> = response.json().await.or_raise(|| ErrorKind::FetchFailed)?;
        tracing::debug!(count = entries.len(), "Fetched extension manifest");
        Ok(entries)
    }

    #[instrument(skip(self, entry), fields(key = %entry.key, version = %entry.version))]
    async fn package(&self, entry: &ManifestEntry) -> Result<Vec<u8>> {
        let response = self.get(self.resolve(&entry.package)?).await?;
        let bytes = response.bytes().await.or_raise(|| ErrorKind::FetchFailed)?;
        Ok(bytes.to_vec())
    }
}

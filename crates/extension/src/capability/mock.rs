//! Scripted in-memory source for testing.

use crate::capability::{CapabilityHandle, SourceCapability};
use crate::capability::error::{ErrorKind, Result};
use crate::loader::Resolver;
use crate::models::{ChapterSummary, ListQuery, MangaDetail, MangaSummary, PageRef};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// A source whose answers are set up by the test.
///
/// Unknown manga details answer [`ErrorKind::NotFound`]; unscripted chapter
/// and page lists answer [`ErrorKind::SourceProtocolError`]. Every call is
/// recorded, so tests can assert on what was (or wasn't) invoked.
///
/// # Examples
///
/// ```
/// use hondana_extension::capability::{ScriptedSource, SourceCapability};
/// use hondana_extension::models::ChapterSummary;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let source = ScriptedSource::new("alpha");
/// source.set_chapters("m1", vec![ChapterSummary::new("c1", "Chapter 1")]).await;
/// assert_eq!(source.chapter_list("m1").await.unwrap().len(), 1);
/// assert_eq!(source.calls().await, vec!["chapter_list:m1"]);
/// # }
/// ```
pub struct ScriptedSource {
    key: String,
    script: RwLock<Script>,
}

#[derive(Default)]
struct Script {
    catalog: Vec<MangaSummary>,
    details: HashMap<String, MangaDetail>,
    chapters: HashMap<String, std::result::Result<Vec<ChapterSummary>, ErrorKind>>,
    pages: HashMap<(String, String), std::result::Result<Vec<PageRef>, ErrorKind>>,
    delay: Option<Duration>,
    calls: Vec<String>,
}

impl ScriptedSource {
    pub fn new(key: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            script: RwLock::new(Script::default()),
        })
    }

    pub async fn set_catalog(&self, mangas: Vec<MangaSummary>) {
        self.script.write().await.catalog = mangas;
    }

    pub async fn set_detail(&self, detail: MangaDetail) {
        self.script.write().await.details.insert(detail.id.clone(), detail);
    }

    pub async fn set_chapters(&self, manga_id: &str, chapters: Vec<ChapterSummary>) {
        self.script.write().await.chapters.insert(manga_id.to_string(), Ok(chapters));
    }

    pub async fn fail_chapters(&self, manga_id: &str, kind: ErrorKind) {
        self.script.write().await.chapters.insert(manga_id.to_string(), Err(kind));
    }

    pub async fn set_pages(&self, manga_id: &str, chapter_id: &str, pages: Vec<PageRef>) {
        let key = (manga_id.to_string(), chapter_id.to_string());
        self.script.write().await.pages.insert(key, Ok(pages));
    }

    pub async fn fail_pages(&self, manga_id: &str, chapter_id: &str, kind: ErrorKind) {
        let key = (manga_id.to_string(), chapter_id.to_string());
        self.script.write().await.pages.insert(key, Err(kind));
    }

    /// Make every call sleep before answering.
    pub async fn set_delay(&self, delay: Duration) {
        self.script.write().await.delay = Some(delay);
    }

    /// Calls received so far, as `operation:argument`.
    pub async fn calls(&self) -> Vec<String> {
        self.script.read().await.calls.clone()
    }

    async fn record(&self, call: String) {
        let delay = {
            let mut script = self.script.write().await;
            script.calls.push(call);
            script.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SourceCapability for ScriptedSource {
    fn key(&self) -> &str {
        &self.key
    }

    async fn list_manga(&self, query: &ListQuery) -> Result<Vec<MangaSummary>> {
        self.record(format!("list_manga:{}", query.page)).await;
        let script = self.script.read().await;
        let matches = script
            .catalog
            .iter()
            .filter(|manga| query.keyword.as_ref().is_none_or(|keyword| manga.title.contains(keyword.as_str())))
            .cloned();
        Ok(if query.page <= 1 { matches.collect() } else { Vec::new() })
    }

    async fn manga_detail(&self, manga_id: &str) -> Result<MangaDetail> {
        self.record(format!("manga_detail:{manga_id}")).await;
        match self.script.read().await.details.get(manga_id) {
            Some(detail) => Ok(detail.clone()),
            None => exn::bail!(ErrorKind::NotFound(manga_id.to_string())),
        }
    }

    async fn chapter_list(&self, manga_id: &str) -> Result<Vec<ChapterSummary>> {
        self.record(format!("chapter_list:{manga_id}")).await;
        match self.script.read().await.chapters.get(manga_id) {
            Some(Ok(chapters)) => Ok(chapters.clone()),
            Some(Err(kind)) => exn::bail!(kind.clone()),
            None => exn::bail!(ErrorKind::SourceProtocolError),
        }
    }

    async fn page_list(&self, manga_id: &str, chapter_id: &str) -> Result<Vec<PageRef>> {
        self.record(format!("page_list:{manga_id}/{chapter_id}")).await;
        let key = (manga_id.to_string(), chapter_id.to_string());
        match self.script.read().await.pages.get(&key) {
            Some(Ok(pages)) => Ok(pages.clone()),
            Some(Err(kind)) => exn::bail!(kind.clone()),
            None => exn::bail!(ErrorKind::SourceProtocolError),
        }
    }
}

/// A [`Resolver`] over a fixed set of sources, without any store behind it.
#[derive(Default)]
pub struct StaticResolver {
    sources: RwLock<HashMap<String, CapabilityHandle>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: impl IntoIterator<Item = CapabilityHandle>) -> Self {
        let sources = sources.into_iter().map(|source| (source.key().to_string(), source)).collect();
        Self { sources: RwLock::new(sources) }
    }

    pub async fn insert(&self, source: CapabilityHandle) {
        self.sources.write().await.insert(source.key().to_string(), source);
    }

    pub async fn remove(&self, key: &str) {
        self.sources.write().await.remove(key);
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, key: &str) -> crate::error::Result<CapabilityHandle> {
        match self.sources.read().await.get(key) {
            Some(source) => Ok(source.clone()),
            None => exn::bail!(crate::error::ErrorKind::NotInstalled(key.to_string())),
        }
    }
}

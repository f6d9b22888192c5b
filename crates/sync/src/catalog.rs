use crate::error::{self, Result};
use crate::synchronizer::{SyncOptions, bounded};
use hondana_extension::models::ListQuery;
use hondana_extension::{CapabilityHandle, ResolverHandle};
use hondana_graph::{ChapterDiff, ChapterId, Manga, MangaId, Page, Repository};
use std::time::Duration;
use tracing::instrument;

/// On-demand browsing: every call goes to the source (through the same
/// bounded timeout as sync runs) and persists what comes back.
///
/// Unlike the [`Synchronizer`](crate::Synchronizer), nothing here creates
/// updates, and failures are returned to the caller instead of reported.
pub struct Catalog {
    repo: Repository,
    resolver: ResolverHandle,
    call_timeout: Duration,
}

impl Catalog {
    pub fn new(repo: Repository, resolver: ResolverHandle, options: &SyncOptions) -> Self {
        Self {
            repo,
            resolver,
            call_timeout: options.call_timeout,
        }
    }

    async fn source(&self, key: &str) -> Result<CapabilityHandle> {
        self.resolver.resolve(key).await.map_err(error::resolve)
    }

    /// List (or search) a source and store every manga it returned.
    #[instrument(skip(self))]
    pub async fn search(&self, source_key: &str, query: &ListQuery) -> Result<Vec<Manga>> {
        let source = self.source(source_key).await?;
        let summaries = bounded(self.call_timeout, source.list_manga(query)).await.map_err(error::capability)?;
        let mut mangas = Vec::with_capacity(summaries.len());
        for summary in &summaries {
            mangas.push(self.repo.upsert_manga(source_key, summary).await.map_err(error::graph)?);
        }
        Ok(mangas)
    }

    /// Fetch the detail page of a stored manga and persist it.
    #[instrument(skip(self))]
    pub async fn refresh_manga(&self, manga: MangaId) -> Result<Manga> {
        let manga = self.repo.get_manga(manga).await.map_err(error::graph)?;
        let source = self.source(&manga.source_key).await?;
        let detail = bounded(self.call_timeout, source.manga_detail(&manga.provider_id)).await.map_err(error::capability)?;
        self.repo.upsert_manga_detail(&manga.source_key, &detail).await.map_err(error::graph)
    }

    /// Reconcile the stored chapters of a manga with the source.
    #[instrument(skip(self))]
    pub async fn refresh_chapters(&self, manga: MangaId) -> Result<ChapterDiff> {
        let manga = self.repo.get_manga(manga).await.map_err(error::graph)?;
        let source = self.source(&manga.source_key).await?;
        let chapters = bounded(self.call_timeout, source.chapter_list(&manga.provider_id)).await.map_err(error::capability)?;
        self.repo.upsert_chapters(manga.id, &chapters).await.map_err(error::graph)
    }

    /// Pages of a chapter. Stored pages are returned as they are unless
    /// `refresh` is set or none were fetched yet; otherwise the whole page
    /// set is fetched and replaced.
    #[instrument(skip(self))]
    pub async fn pages(&self, chapter: ChapterId, refresh: bool) -> Result<Vec<Page>> {
        if !refresh {
            let pages = self.repo.list_pages(chapter).await.map_err(error::graph)?;
            if !pages.is_empty() {
                return Ok(pages);
            }
        }
        let chapter = self.repo.get_chapter(chapter).await.map_err(error::graph)?;
        let manga = self.repo.get_manga(chapter.manga_id).await.map_err(error::graph)?;
        let source = self.source(&manga.source_key).await?;
        let pages = bounded(self.call_timeout, source.page_list(&manga.provider_id, &chapter.provider_id))
            .await
            .map_err(error::capability)?;
        self.repo.upsert_pages(chapter.id, &pages).await.map_err(error::graph)
    }
}

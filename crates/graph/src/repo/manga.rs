use crate::Repository;
use crate::error::{ErrorKind, Result};
use crate::models::{Manga, MangaId, MangaRow};
use exn::{OptionExt, ResultExt};
use hondana_extension::models::{MangaDetail, MangaSummary};
use sqlx::SqliteConnection;
use time::OffsetDateTime;

impl Repository {
    /// Insert a manga seen in a listing, or refresh its title and cover.
    /// Detail fields and the favorite flag are left alone.
    pub async fn upsert_manga(&self, source_key: &str, summary: &MangaSummary) -> Result<Manga> {
        let row: MangaRow = sqlx::query_as(include_str!("../../queries/upsert_manga.sql"))
            .bind(source_key)
            .bind(&summary.id)
            .bind(&summary.title)
            .bind(&summary.cover_url)
            .bind(OffsetDateTime::now_utc().unix_timestamp())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.try_into()
    }

    /// Insert or refresh a manga with everything its detail page reports.
    pub async fn upsert_manga_detail(&self, source_key: &str, detail: &MangaDetail) -> Result<Manga> {
        let authors = serde_json::to_string(&detail.authors).or_raise(|| ErrorKind::InvalidData("authors"))?;
        let genres = serde_json::to_string(&detail.genres).or_raise(|| ErrorKind::InvalidData("genres"))?;
        let row: MangaRow = sqlx::query_as(include_str!("../../queries/upsert_manga_detail.sql"))
            .bind(source_key)
            .bind(&detail.id)
            .bind(&detail.title)
            .bind(&detail.cover_url)
            .bind(detail.status.as_str())
            .bind(&detail.description)
            .bind(authors)
            .bind(genres)
            .bind(OffsetDateTime::now_utc().unix_timestamp())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.try_into()
    }

    pub async fn set_favorite(&self, manga: MangaId, favorite: bool) -> Result<()> {
        let result = sqlx::query(include_str!("../../queries/set_favorite.sql"))
            .bind(manga)
            .bind(favorite)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(format!("manga {manga}")));
        }
        Ok(())
    }

    pub async fn get_manga(&self, manga: MangaId) -> Result<Manga> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        Self::fetch_manga(&mut conn, manga).await
    }

    pub async fn find_manga(&self, source_key: &str, provider_id: &str) -> Result<Option<Manga>> {
        let row: Option<MangaRow> = sqlx::query_as(include_str!("../../queries/find_manga.sql"))
            .bind(source_key)
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Manga::try_from).transpose()
    }

    /// Every stored manga of a source, by title.
    pub async fn list_manga(&self, source_key: &str) -> Result<Vec<Manga>> {
        let rows: Vec<MangaRow> = sqlx::query_as(include_str!("../../queries/list_manga.sql"))
            .bind(source_key)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Manga::try_from).collect()
    }

    /// Favorites ordered by source key, then by when they were first stored.
    /// Includes favorites of disabled sources.
    pub async fn list_favorites(&self) -> Result<Vec<Manga>> {
        let rows: Vec<MangaRow> = sqlx::query_as(include_str!("../../queries/list_favorites.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Manga::try_from).collect()
    }

    pub(crate) async fn fetch_manga(conn: &mut SqliteConnection, manga: MangaId) -> Result<Manga> {
        let row: Option<MangaRow> = sqlx::query_as(include_str!("../../queries/get_manga.sql"))
            .bind(manga)
            .fetch_optional(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.ok_or_raise(|| ErrorKind::NotFound(format!("manga {manga}")))?.try_into()
    }
}

use crate::Repository;
use crate::error::{ErrorKind, Result};
use crate::models::{ChapterId, History, HistoryRow};
use exn::{OptionExt, ResultExt};
use time::OffsetDateTime;

impl Repository {
    /// Record how far a chapter has been read. Once a chapter is complete it
    /// stays complete.
    pub async fn record_progress(&self, chapter: ChapterId, last_page_read: u32, complete: bool, read_at: OffsetDateTime) -> Result<History> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query_scalar::<_, i64>("SELECT id FROM chapters WHERE id = ?1")
            .bind(chapter)
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?
            .ok_or_raise(|| ErrorKind::NotFound(format!("chapter {chapter}")))?;
        sqlx::query(include_str!("../../queries/upsert_history.sql"))
            .bind(chapter)
            .bind(last_page_read)
            .bind(complete)
            .bind(read_at.unix_timestamp())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let row: HistoryRow = sqlx::query_as(include_str!("../../queries/get_history.sql"))
            .bind(chapter)
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        row.try_into()
    }

    pub async fn history(&self, chapter: ChapterId) -> Result<Option<History>> {
        let row: Option<HistoryRow> = sqlx::query_as(include_str!("../../queries/get_history.sql"))
            .bind(chapter)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(History::try_from).transpose()
    }

    /// Reading history, most recent first. Pass the `read_at` of the last
    /// entry of a page as `before` to get the next page.
    pub async fn list_history(&self, before: Option<OffsetDateTime>, limit: u32) -> Result<Vec<History>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(include_str!("../../queries/list_history.sql"))
            .bind(before.map_or(i64::MAX, OffsetDateTime::unix_timestamp))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(History::try_from).collect()
    }
}

use crate::Repository;
use crate::error::{ErrorKind, Result};
use crate::models::{ChapterId, Page, PageRow};
use crate::repo::Entity;
use exn::{OptionExt, ResultExt};
use hondana_extension::models::PageRef;

impl Repository {
    /// Replace the page set of a chapter.
    ///
    /// Old pages are deleted and the new ones inserted in one transaction,
    /// so readers see either the previous set or the new one.
    pub async fn upsert_pages(&self, chapter: ChapterId, remote: &[PageRef]) -> Result<Vec<Page>> {
        let _guard = self.lock(Entity::Chapter(chapter)).await;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query_scalar::<_, i64>("SELECT id FROM chapters WHERE id = ?1")
            .bind(chapter)
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?
            .ok_or_raise(|| ErrorKind::NotFound(format!("chapter {chapter}")))?;

        sqlx::query(include_str!("../../queries/delete_pages.sql"))
            .bind(chapter)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut pages = Vec::with_capacity(remote.len());
        for (ordinal, reference) in remote.iter().enumerate() {
            let ordinal = u32::try_from(ordinal).or_raise(|| ErrorKind::InvalidData("page ordinal"))?;
            sqlx::query(include_str!("../../queries/insert_page.sql"))
                .bind(chapter)
                .bind(ordinal)
                .bind(reference.kind())
                .bind(reference.value())
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            pages.push(Page {
                chapter_id: chapter,
                ordinal,
                reference: reference.clone(),
            });
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(pages)
    }

    /// Stored pages of a chapter by ordinal. Empty if never fetched.
    pub async fn list_pages(&self, chapter: ChapterId) -> Result<Vec<Page>> {
        let rows: Vec<PageRow> = sqlx::query_as(include_str!("../../queries/list_pages.sql"))
            .bind(chapter)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Page::try_from).collect()
    }
}

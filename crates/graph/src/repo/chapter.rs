use crate::Repository;
use crate::error::{ErrorKind, Result};
use crate::models::{Chapter, ChapterDiff, ChapterId, ChapterRow, ChapterSync, MangaId, Update, UpdateRow};
use crate::repo::Entity;
use exn::{OptionExt, ResultExt};
use hondana_extension::models::ChapterSummary;
use sqlx::SqliteConnection;
use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;
use tracing::{debug, instrument};

impl Repository {
    /// Reconcile a remote chapter list with the stored chapters of a manga.
    ///
    /// Remote chapters are matched by provider identifier. Unmatched ones are
    /// inserted; matched ones are left untouched; stored chapters the source
    /// no longer reports are kept. Creates no updates.
    #[instrument(skip(self, remote), fields(remote = remote.len()))]
    pub async fn upsert_chapters(&self, manga: MangaId, remote: &[ChapterSummary]) -> Result<ChapterDiff> {
        let _guard = self.lock(Entity::Manga(manga)).await;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Self::fetch_manga(&mut tx, manga).await?;
        let diff = Self::reconcile(&mut tx, manga, remote, OffsetDateTime::now_utc()).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(diff)
    }

    /// Reconcile a chapter list fetched by a sync run and, when the manga is
    /// a favorite, record one update per created chapter. The chapters, the
    /// updates and the manga's sync timestamp are committed together.
    ///
    /// Created chapters published before the manga's previous sync are still
    /// recorded, flagged as backfilled.
    #[instrument(skip(self, remote), fields(remote = remote.len()))]
    pub async fn commit_chapter_sync(&self, manga: MangaId, remote: &[ChapterSummary], now: OffsetDateTime) -> Result<ChapterSync> {
        let _guard = self.lock(Entity::Manga(manga)).await;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let stored = Self::fetch_manga(&mut tx, manga).await?;
        let diff = Self::reconcile(&mut tx, manga, remote, now).await?;

        let mut updates = Vec::new();
        if stored.is_favorite {
            for chapter in &diff.created {
                let backfilled = matches!(
                    (chapter.published_at, stored.last_synced_at),
                    (Some(published), Some(synced)) if published < synced
                );
                let id: Option<i64> = sqlx::query_scalar(include_str!("../../queries/insert_update.sql"))
                    .bind(manga)
                    .bind(chapter.id)
                    .bind(now.unix_timestamp())
                    .bind(backfilled)
                    .fetch_optional(&mut *tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                let Some(id) = id else {
                    continue;
                };
                if backfilled {
                    debug!(manga, chapter = %chapter.provider_id, "recording backfilled chapter as an update");
                }
                let row: UpdateRow = sqlx::query_as(include_str!("../../queries/get_update.sql"))
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                updates.push(Update::try_from(row)?);
            }
        }

        sqlx::query(include_str!("../../queries/touch_manga_synced.sql"))
            .bind(manga)
            .bind(now.unix_timestamp())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(ChapterSync { diff, updates })
    }

    /// Chapters of a manga in display order: dated chapters oldest first,
    /// then undated ones in the order they were first seen.
    pub async fn list_chapters(&self, manga: MangaId) -> Result<Vec<Chapter>> {
        let mut conn = self.pool.acquire().await.or_raise(|| ErrorKind::Database)?;
        Self::fetch_chapters(&mut conn, manga).await
    }

    pub async fn get_chapter(&self, chapter: ChapterId) -> Result<Chapter> {
        let row: Option<ChapterRow> = sqlx::query_as(include_str!("../../queries/get_chapter.sql"))
            .bind(chapter)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.ok_or_raise(|| ErrorKind::NotFound(format!("chapter {chapter}")))?.try_into()
    }

    async fn fetch_chapters(conn: &mut SqliteConnection, manga: MangaId) -> Result<Vec<Chapter>> {
        let rows: Vec<ChapterRow> = sqlx::query_as(include_str!("../../queries/list_chapters.sql"))
            .bind(manga)
            .fetch_all(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Chapter::try_from).collect()
    }

    async fn reconcile(conn: &mut SqliteConnection, manga: MangaId, remote: &[ChapterSummary], now: OffsetDateTime) -> Result<ChapterDiff> {
        let mut stored: HashMap<String, Chapter> = Self::fetch_chapters(conn, manga)
            .await?
            .into_iter()
            .map(|chapter| (chapter.provider_id.clone(), chapter))
            .collect();
        let mut seen = HashSet::with_capacity(remote.len());
        let mut diff = ChapterDiff::default();

        for summary in remote {
            if !seen.insert(summary.id.as_str()) {
                continue;
            }
            if let Some(chapter) = stored.remove(&summary.id) {
                diff.unchanged.push(chapter);
                continue;
            }
            let row: ChapterRow = sqlx::query_as(include_str!("../../queries/insert_chapter.sql"))
                .bind(manga)
                .bind(&summary.id)
                .bind(&summary.title)
                .bind(summary.number)
                .bind(summary.published_at.map(OffsetDateTime::unix_timestamp))
                .bind(now.unix_timestamp())
                .fetch_optional(&mut *conn)
                .await
                .or_raise(|| ErrorKind::Database)?
                .ok_or_raise(|| ErrorKind::Constraint("chapter appeared during reconciliation"))?;
            diff.created.push(row.try_into()?);
        }
        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::repo::fixtures::{at, chapters, database, favorite};
    use hondana_extension::models::{ChapterSummary, MangaSummary};
    use rstest::rstest;

    fn ids(chapters: &[crate::Chapter]) -> Vec<&str> {
        chapters.iter().map(|c| c.provider_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_new_chapter_is_the_only_update() {
        let (_db, repo) = database(&["alpha"]).await;
        let m1 = favorite(&repo, "alpha", "M1").await;
        repo.upsert_chapters(m1.id, &chapters(&["c1", "c2"])).await.unwrap();
        let before = repo.list_chapters(m1.id).await.unwrap();

        let sync = repo.commit_chapter_sync(m1.id, &chapters(&["c1", "c2", "c3"]), at(1_000)).await.unwrap();
        assert_eq!(ids(&sync.diff.created), vec!["c3"]);
        assert_eq!(ids(&sync.diff.unchanged), vec!["c1", "c2"]);
        assert_eq!(sync.updates.len(), 1);
        assert_eq!(sync.updates[0].chapter_id, sync.diff.created[0].id);
        assert!(!sync.updates[0].seen);

        let after = repo.list_chapters(m1.id).await.unwrap();
        assert_eq!(&after[..2], &before[..]);
        assert_eq!(repo.list_updates(false, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_identical_list_twice_creates_no_updates() {
        let (_db, repo) = database(&["alpha"]).await;
        let m1 = favorite(&repo, "alpha", "M1").await;
        let remote = chapters(&["c1", "c2", "c3"]);
        let first = repo.commit_chapter_sync(m1.id, &remote, at(1_000)).await.unwrap();
        assert_eq!(first.updates.len(), 3);
        let second = repo.commit_chapter_sync(m1.id, &remote, at(2_000)).await.unwrap();
        assert!(second.diff.created.is_empty());
        assert!(second.updates.is_empty());
        assert_eq!(repo.list_updates(false, 10).await.unwrap().len(), 3);
        assert_eq!(repo.get_manga(m1.id).await.unwrap().last_synced_at, Some(at(2_000)));
    }

    #[tokio::test]
    async fn test_non_favorite_gets_no_updates() {
        let (_db, repo) = database(&["alpha"]).await;
        let manga = repo.upsert_manga("alpha", &MangaSummary::new("M1", "Moonlit")).await.unwrap();
        let sync = repo.commit_chapter_sync(manga.id, &chapters(&["c1"]), at(1_000)).await.unwrap();
        assert_eq!(sync.diff.created.len(), 1);
        assert!(sync.updates.is_empty());
    }

    #[tokio::test]
    async fn test_omitted_chapters_are_retained() {
        let (_db, repo) = database(&["alpha"]).await;
        let m1 = favorite(&repo, "alpha", "M1").await;
        repo.upsert_chapters(m1.id, &chapters(&["c1", "c2", "c3"])).await.unwrap();
        let diff = repo.upsert_chapters(m1.id, &chapters(&["c3"])).await.unwrap();
        assert_eq!(ids(&diff.unchanged), vec!["c3"]);
        assert_eq!(repo.list_chapters(m1.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_provider_ids_collapse_to_first() {
        let (_db, repo) = database(&["alpha"]).await;
        let m1 = favorite(&repo, "alpha", "M1").await;
        let remote = vec![ChapterSummary::new("c1", "First"), ChapterSummary::new("c2", "Second"), ChapterSummary::new("c1", "Repeat")];
        let diff = repo.upsert_chapters(m1.id, &remote).await.unwrap();
        assert_eq!(ids(&diff.created), vec!["c1", "c2"]);
        assert_eq!(diff.created[0].title, "First");
    }

    #[tokio::test]
    async fn test_display_order() {
        let (_db, repo) = database(&["alpha"]).await;
        let m1 = favorite(&repo, "alpha", "M1").await;
        let remote = vec![
            ChapterSummary::new("undated-1", "?"),
            ChapterSummary::new("late", "Late").published(at(300)),
            ChapterSummary::new("undated-2", "?"),
            ChapterSummary::new("early", "Early").published(at(100)),
            ChapterSummary::new("tie", "Tie").published(at(100)),
        ];
        repo.upsert_chapters(m1.id, &remote).await.unwrap();
        let listed = repo.list_chapters(m1.id).await.unwrap();
        assert_eq!(ids(&listed), vec!["early", "tie", "late", "undated-1", "undated-2"]);
    }

    #[tokio::test]
    async fn test_backfilled_chapters_are_flagged() {
        let (_db, repo) = database(&["alpha"]).await;
        let m1 = favorite(&repo, "alpha", "M1").await;
        repo.commit_chapter_sync(m1.id, &chapters(&["c1"]), at(1_000)).await.unwrap();
        let remote = vec![
            ChapterSummary::new("c1", "Chapter 1"),
            ChapterSummary::new("old", "Republished").published(at(500)),
            ChapterSummary::new("new", "Fresh").published(at(1_500)),
            ChapterSummary::new("undated", "Unknown"),
        ];
        let sync = repo.commit_chapter_sync(m1.id, &remote, at(2_000)).await.unwrap();
        let flags: Vec<_> = sync.updates.iter().map(|u| (u.chapter_provider_id.as_str(), u.backfilled)).collect();
        assert_eq!(flags, vec![("old", true), ("new", false), ("undated", false)]);
    }

    #[rstest]
    #[case::never_synced(Some(500), None, false)]
    #[case::undated(None, Some(1_000), false)]
    #[case::published_before_last_sync(Some(500), Some(1_000), true)]
    #[case::published_at_last_sync(Some(1_000), Some(1_000), false)]
    #[case::published_after_last_sync(Some(1_500), Some(1_000), false)]
    #[tokio::test]
    async fn test_backfill_flag(#[case] published: Option<i64>, #[case] last_synced: Option<i64>, #[case] expected: bool) {
        let (_db, repo) = database(&["alpha"]).await;
        let m1 = favorite(&repo, "alpha", "M1").await;
        if let Some(last_synced) = last_synced {
            repo.commit_chapter_sync(m1.id, &[], at(last_synced)).await.unwrap();
        }
        let mut chapter = ChapterSummary::new("c1", "Chapter 1");
        if let Some(published) = published {
            chapter = chapter.published(at(published));
        }
        let sync = repo.commit_chapter_sync(m1.id, &[chapter], at(2_000)).await.unwrap();
        assert_eq!(sync.updates[0].backfilled, expected);
    }

    #[tokio::test]
    async fn test_resync_keeps_reading_progress() {
        let (_db, repo) = database(&["alpha"]).await;
        let manga = repo.upsert_manga("alpha", &MangaSummary::new("M1", "Moonlit")).await.unwrap();
        let diff = repo.upsert_chapters(manga.id, &chapters(&["c1"])).await.unwrap();
        repo.record_progress(diff.created[0].id, 3, false, at(100)).await.unwrap();
        repo.set_favorite(manga.id, true).await.unwrap();
        let sync = repo.commit_chapter_sync(manga.id, &chapters(&["c1", "c2"]), at(200)).await.unwrap();
        assert_eq!(sync.updates.len(), 1);
        assert_eq!(sync.updates[0].chapter_provider_id, "c2");

        let listed = repo.list_chapters(manga.id).await.unwrap();
        assert_eq!(listed[0].last_page_read, Some(3));
        assert!(!listed[0].read);
    }

    #[tokio::test]
    async fn test_unknown_manga_commits_nothing() {
        let (_db, repo) = database(&["alpha"]).await;
        let err = repo.commit_chapter_sync(7, &chapters(&["c1"]), at(1)).await.unwrap_err();
        assert_eq!(*err, ErrorKind::NotFound("manga 7".to_string()));
        assert!(repo.list_chapters(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writers_for_different_manga() {
        let (_db, repo) = database(&["alpha"]).await;
        let mut handles = Vec::new();
        for i in 0..4 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let manga = favorite(&repo, "alpha", &format!("M{i}")).await;
                repo.commit_chapter_sync(manga.id, &chapters(&["c1", "c2"]), at(10)).await.unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().updates.len(), 2);
        }
        assert_eq!(repo.list_updates(true, 100).await.unwrap().len(), 8);
    }
}

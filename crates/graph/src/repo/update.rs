use crate::Repository;
use crate::error::{ErrorKind, Result};
use crate::models::{Update, UpdateId, UpdateRow};
use exn::ResultExt;

impl Repository {
    /// Most recently discovered first.
    pub async fn list_updates(&self, unseen_only: bool, limit: u32) -> Result<Vec<Update>> {
        let rows: Vec<UpdateRow> = sqlx::query_as(include_str!("../../queries/list_updates.sql"))
            .bind(unseen_only)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Update::try_from).collect()
    }

    /// Returns how many of the given updates were unseen. Unknown ids are
    /// ignored.
    pub async fn mark_updates_seen(&self, ids: &[UpdateId]) -> Result<u64> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let mut marked = 0;
        for id in ids {
            marked += sqlx::query(include_str!("../../queries/mark_update_seen.sql"))
                .bind(id)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?
                .rows_affected();
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(marked)
    }

    pub async fn mark_all_updates_seen(&self) -> Result<u64> {
        let result = sqlx::query(include_str!("../../queries/mark_all_updates_seen.sql"))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    /// Delete acknowledged updates. The chapters they pointed at stay.
    pub async fn prune_seen_updates(&self) -> Result<u64> {
        let result = sqlx::query(include_str!("../../queries/prune_seen_updates.sql"))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::repo::fixtures::{at, chapters, database, favorite};

    #[tokio::test]
    async fn test_acknowledging_updates() {
        let (_db, repo) = database(&["alpha"]).await;
        let m1 = favorite(&repo, "alpha", "M1").await;
        repo.commit_chapter_sync(m1.id, &chapters(&["c1"]), at(100)).await.unwrap();
        repo.commit_chapter_sync(m1.id, &chapters(&["c1", "c2", "c3"]), at(200)).await.unwrap();

        let updates = repo.list_updates(true, 10).await.unwrap();
        let titles: Vec<_> = updates.iter().map(|u| u.chapter_provider_id.as_str()).collect();
        assert_eq!(titles, vec!["c3", "c2", "c1"]);
        assert_eq!(updates[0].source_key, "alpha");
        assert_eq!(updates[0].manga_title, "M1");

        assert_eq!(repo.mark_updates_seen(&[updates[2].id, updates[2].id, 9_999]).await.unwrap(), 1);
        assert_eq!(repo.list_updates(true, 10).await.unwrap().len(), 2);
        assert_eq!(repo.list_updates(false, 2).await.unwrap().len(), 2);

        assert_eq!(repo.prune_seen_updates().await.unwrap(), 1);
        assert_eq!(repo.mark_all_updates_seen().await.unwrap(), 2);
        assert!(repo.list_updates(true, 10).await.unwrap().is_empty());
        assert_eq!(repo.prune_seen_updates().await.unwrap(), 2);
        assert_eq!(repo.list_chapters(m1.id).await.unwrap().len(), 3);
    }
}

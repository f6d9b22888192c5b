use crate::Repository;
use crate::error::{ErrorKind, Result};
use crate::models::{Source, SourceRow};
use exn::{OptionExt, ResultExt};
use hondana_extension::InstallState;
use tracing::{info, instrument};

impl Repository {
    /// Unlike the descriptor store, this also returns disabled sources.
    pub async fn get_source(&self, key: &str) -> Result<Source> {
        let row: Option<SourceRow> = sqlx::query_as(include_str!("../../queries/get_source.sql"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.ok_or_raise(|| ErrorKind::NotFound(format!("source {key}")))?.try_into()
    }

    /// Every registered source in any state, by key.
    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        let rows: Vec<SourceRow> = sqlx::query_as(include_str!("../../queries/list_sources.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Source::try_from).collect()
    }

    /// Delete a disabled source together with everything synced from it.
    #[instrument(skip(self))]
    pub async fn purge_source(&self, key: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let state: Option<String> = sqlx::query_scalar("SELECT state FROM sources WHERE key = ?1")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let state = state.ok_or_raise(|| ErrorKind::NotFound(format!("source {key}")))?;
        if state != InstallState::Disabled.as_str() {
            exn::bail!(ErrorKind::Constraint("source must be uninstalled before it is purged"));
        }
        sqlx::query(include_str!("../../queries/delete_source.sql"))
            .bind(key)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        info!(source = key, "purged source");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::repo::fixtures::{at, chapters, database, favorite};
    use hondana_extension::{DescriptorStore, InstallState};

    #[tokio::test]
    async fn test_purge_requires_uninstall() {
        let (db, repo) = database(&["alpha", "beta"]).await;
        let m1 = favorite(&repo, "alpha", "M1").await;
        let chapter = repo.commit_chapter_sync(m1.id, &chapters(&["c1"]), at(10)).await.unwrap().diff.created[0].id;
        repo.record_progress(chapter, 1, false, at(20)).await.unwrap();

        let err = repo.purge_source("alpha").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Constraint(_)));

        db.descriptor_store().remove("alpha").await.unwrap();
        assert_eq!(repo.get_source("alpha").await.unwrap().state, InstallState::Disabled);
        // Uninstalling keeps everything that was synced.
        assert_eq!(repo.list_chapters(m1.id).await.unwrap().len(), 1);
        assert!(repo.history(chapter).await.unwrap().is_some());

        repo.purge_source("alpha").await.unwrap();
        assert!(matches!(&*repo.get_manga(m1.id).await.unwrap_err(), ErrorKind::NotFound(_)));
        assert!(repo.history(chapter).await.unwrap().is_none());
        assert!(repo.list_updates(false, 10).await.unwrap().is_empty());
        let keys: Vec<_> = repo.list_sources().await.unwrap().into_iter().map(|s| s.descriptor.key).collect();
        assert_eq!(keys, vec!["beta"]);
    }

    #[tokio::test]
    async fn test_purge_unknown_source() {
        let (_db, repo) = database(&[]).await;
        assert_eq!(*repo.purge_source("ghost").await.unwrap_err(), ErrorKind::NotFound("source ghost".to_string()));
    }
}

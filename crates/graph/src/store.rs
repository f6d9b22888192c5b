//! SQLite-backed [`DescriptorStore`].

use crate::Database;
use crate::models::{Source, SourceRow};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use hondana_extension::error::{ErrorKind, Result};
use hondana_extension::{DescriptorStore, ExtensionDescriptor, InstallState};
use sqlx::SqlitePool;
use time::OffsetDateTime;

/// Descriptors live in the `sources` table next to the content they own, so
/// uninstalling keeps the row (disabled) and everything hanging off it.
#[derive(Debug, Clone)]
pub struct SqliteDescriptorStore {
    pool: SqlitePool,
}

impl From<&Database> for SqliteDescriptorStore {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl SqliteDescriptorStore {
    async fn fetch(&self, key: &str) -> Result<Option<Source>> {
        let row: Option<SourceRow> = sqlx::query_as(include_str!("../queries/get_source.sql"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::StoreUnavailable)?;
        row.map(Source::try_from).transpose().or_raise(|| ErrorKind::StoreUnavailable)
    }
}

#[async_trait]
impl DescriptorStore for SqliteDescriptorStore {
    async fn list(&self) -> Result<Vec<ExtensionDescriptor>> {
        let rows: Vec<SourceRow> = sqlx::query_as(include_str!("../queries/list_sources.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::StoreUnavailable)?;
        let mut descriptors = Vec::with_capacity(rows.len());
        for row in rows {
            let source = Source::try_from(row).or_raise(|| ErrorKind::StoreUnavailable)?;
            if source.state.is_active() {
                descriptors.push(source.descriptor);
            }
        }
        Ok(descriptors)
    }

    async fn get(&self, key: &str) -> Result<ExtensionDescriptor> {
        let source = self.fetch(key).await?.filter(|source| source.state.is_active());
        Ok(source.ok_or_raise(|| ErrorKind::NotFound(key.to_string()))?.descriptor)
    }

    async fn upsert(&self, descriptor: &ExtensionDescriptor) -> Result<()> {
        let row = SourceRow::from_descriptor(descriptor, OffsetDateTime::now_utc()).or_raise(|| ErrorKind::StoreUnavailable)?;
        sqlx::query(include_str!("../queries/upsert_source.sql"))
            .bind(row.key)
            .bind(row.name)
            .bind(row.version)
            .bind(row.lib_version)
            .bind(row.endpoint)
            .bind(row.headers)
            .bind(row.runtime)
            .bind(row.icon)
            .bind(row.installed_at)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::StoreUnavailable)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query(include_str!("../queries/disable_source.sql"))
            .bind(key)
            .bind(OffsetDateTime::now_utc().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::StoreUnavailable)?;
        Ok(())
    }

    async fn set_state(&self, key: &str, state: InstallState) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/set_source_state.sql"))
            .bind(key)
            .bind(state.as_str())
            .bind(OffsetDateTime::now_utc().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::StoreUnavailable)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(key.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::fixtures::descriptor;

    async fn store() -> (Database, SqliteDescriptorStore) {
        let db = Database::connect_in_memory().await.unwrap();
        let store = db.descriptor_store();
        (db, store)
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let (_db, store) = store().await;
        let mut alpha = descriptor("alpha");
        store.upsert(&alpha).await.unwrap();
        alpha.version = semver::Version::new(1, 1, 0);
        store.upsert(&alpha).await.unwrap();
        assert_eq!(store.get("alpha").await.unwrap(), alpha);
        assert_eq!(*store.get("beta").await.unwrap_err(), ErrorKind::NotFound("beta".to_string()));
    }

    #[tokio::test]
    async fn test_remove_disables_and_is_idempotent() {
        let (db, store) = store().await;
        store.upsert(&descriptor("beta")).await.unwrap();
        store.upsert(&descriptor("alpha")).await.unwrap();
        store.remove("alpha").await.unwrap();
        store.remove("alpha").await.unwrap();
        store.remove("ghost").await.unwrap();

        assert!(matches!(&*store.get("alpha").await.unwrap_err(), ErrorKind::NotFound(_)));
        let keys: Vec<_> = store.list().await.unwrap().into_iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["beta"]);
        assert_eq!(db.repository().get_source("alpha").await.unwrap().state, InstallState::Disabled);

        // Reinstalling reactivates the same row.
        store.upsert(&descriptor("alpha")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_set_state() {
        let (db, store) = store().await;
        store.upsert(&descriptor("alpha")).await.unwrap();
        store.set_state("alpha", InstallState::UpdateAvailable).await.unwrap();
        assert_eq!(db.repository().get_source("alpha").await.unwrap().state, InstallState::UpdateAvailable);
        assert!(store.get("alpha").await.is_ok());
        assert_eq!(*store.set_state("ghost", InstallState::Installed).await.unwrap_err(), ErrorKind::NotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable_not_missing() {
        let (db, store) = store().await;
        db.close().await;
        assert_eq!(*store.get("alpha").await.unwrap_err(), ErrorKind::StoreUnavailable);
        assert_eq!(*store.list().await.unwrap_err(), ErrorKind::StoreUnavailable);
    }
}

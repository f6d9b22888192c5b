//! Content Graph Repository
//!
//! Reads and writes of the source → manga → chapter → page graph, plus the
//! updates and reading history hanging off it.
//!
//! Writers targeting different manga (or chapters) run concurrently. Writers
//! targeting the *same* manga or chapter are serialized through per-entity
//! locks shared by every repository built from one [`Database`], and each
//! write is a single transaction.

mod chapter;
mod history;
mod manga;
mod page;
mod source;
mod update;

use crate::Database;
use crate::models::{ChapterId, MangaId};
use hondana_asyncutils::{KeyedGuard, KeyedMutex};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Lock key for per-entity write serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Entity {
    Manga(MangaId),
    Chapter(ChapterId),
}

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    locks: Arc<KeyedMutex<Entity>>,
}

impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
            locks: db.locks(),
        }
    }
}

impl Repository {
    async fn lock(&self, entity: Entity) -> KeyedGuard {
        self.locks.lock(entity).await
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::Manga;
    use crate::{Database, Repository};
    use hondana_extension::models::{ChapterSummary, MangaSummary};
    use hondana_extension::{DescriptorStore, ExtensionDescriptor, HeaderPolicy, Runtime};
    use semver::Version;
    use time::OffsetDateTime;

    pub(crate) fn descriptor(key: &str) -> ExtensionDescriptor {
        ExtensionDescriptor {
            key: key.to_string(),
            name: key.to_uppercase(),
            version: Version::new(1, 0, 0),
            lib_version: Version::new(1, 0, 0),
            endpoint: format!("https://{key}.example"),
            headers: HeaderPolicy::default(),
            runtime: Runtime::Native { module: key.to_string() },
            icon: None,
        }
    }

    /// In-memory database with the given sources installed.
    pub(crate) async fn database(sources: &[&str]) -> (Database, Repository) {
        let db = Database::connect_in_memory().await.unwrap();
        let store = db.descriptor_store();
        for key in sources {
            store.upsert(&descriptor(key)).await.unwrap();
        }
        let repo = db.repository();
        (db, repo)
    }

    pub(crate) async fn favorite(repo: &Repository, source: &str, provider_id: &str) -> Manga {
        let manga = repo.upsert_manga(source, &MangaSummary::new(provider_id, provider_id.to_uppercase())).await.unwrap();
        repo.set_favorite(manga.id, true).await.unwrap();
        repo.get_manga(manga.id).await.unwrap()
    }

    pub(crate) fn chapters(ids: &[&str]) -> Vec<ChapterSummary> {
        ids.iter().map(|id| ChapterSummary::new(*id, format!("Chapter {id}"))).collect()
    }

    pub(crate) fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(seconds).unwrap()
    }
}

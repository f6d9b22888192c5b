use crate::error::Error;
use crate::models::{ChapterId, MangaId, from_timestamp};
use time::OffsetDateTime;

pub type UpdateId = i64;

/// A chapter the synchronizer discovered for a favorite manga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub id: UpdateId,
    pub manga_id: MangaId,
    pub chapter_id: ChapterId,
    pub source_key: String,
    pub manga_title: String,
    pub chapter_provider_id: String,
    pub chapter_title: String,
    pub discovered_at: OffsetDateTime,
    pub seen: bool,
    /// The chapter claims to predate the manga's previous sync: most likely
    /// republished or backfilled by the source rather than a new release.
    pub backfilled: bool,
}

#[derive(sqlx::FromRow)]
pub(crate) struct UpdateRow {
    id: i64,
    manga_id: i64,
    chapter_id: i64,
    source_key: String,
    manga_title: String,
    chapter_provider_id: String,
    chapter_title: String,
    discovered_at: i64,
    seen: bool,
    backfilled: bool,
}

impl TryFrom<UpdateRow> for Update {
    type Error = Error;
    fn try_from(row: UpdateRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            manga_id: row.manga_id,
            chapter_id: row.chapter_id,
            source_key: row.source_key,
            manga_title: row.manga_title,
            chapter_provider_id: row.chapter_provider_id,
            chapter_title: row.chapter_title,
            discovered_at: from_timestamp(row.discovered_at, "discovery date")?,
            seen: row.seen,
            backfilled: row.backfilled,
        })
    }
}

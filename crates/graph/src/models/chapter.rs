use crate::error::{Error, ErrorKind};
use crate::models::{MangaId, Update, from_optional_timestamp, from_timestamp};
use exn::ResultExt;
use time::OffsetDateTime;

pub type ChapterId = i64;

#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: ChapterId,
    pub manga_id: MangaId,
    /// Identifier assigned by the source; unique within the manga.
    pub provider_id: String,
    pub title: String,
    pub number: Option<f64>,
    pub published_at: Option<OffsetDateTime>,
    pub discovered_at: OffsetDateTime,
    /// Derived from reading history.
    pub read: bool,
    pub last_page_read: Option<u32>,
}

/// Outcome of reconciling a remote chapter list with the stored one.
///
/// Stored chapters missing from the remote list appear in neither half:
/// they are kept, not deleted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterDiff {
    /// Newly inserted, in the order the source reported them.
    pub created: Vec<Chapter>,
    /// Already stored and left untouched, in the order the source reported them.
    pub unchanged: Vec<Chapter>,
}

/// What one synchronization of a manga committed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterSync {
    pub diff: ChapterDiff,
    /// One per created chapter, unless the manga isn't a favorite (or the
    /// chapter already has reading history).
    pub updates: Vec<Update>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ChapterRow {
    id: i64,
    manga_id: i64,
    provider_id: String,
    title: String,
    number: Option<f64>,
    published_at: Option<i64>,
    discovered_at: i64,
    #[sqlx(default)]
    last_page_read: Option<i64>,
    #[sqlx(default)]
    is_complete: Option<bool>,
}

impl TryFrom<ChapterRow> for Chapter {
    type Error = Error;
    fn try_from(row: ChapterRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            manga_id: row.manga_id,
            provider_id: row.provider_id,
            title: row.title,
            number: row.number,
            published_at: from_optional_timestamp(row.published_at, "publication date")?,
            discovered_at: from_timestamp(row.discovered_at, "discovery date")?,
            read: row.is_complete.unwrap_or(false),
            last_page_read: row
                .last_page_read
                .map(u32::try_from)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("last page read"))?,
        })
    }
}

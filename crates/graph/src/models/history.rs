use crate::error::{Error, ErrorKind};
use crate::models::{ChapterId, MangaId, from_timestamp};
use exn::ResultExt;
use time::OffsetDateTime;

/// Reading progress for one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    pub chapter_id: ChapterId,
    pub manga_id: MangaId,
    pub manga_title: String,
    pub chapter_title: String,
    /// Zero-based ordinal of the last page shown to the reader.
    pub last_page_read: u32,
    pub is_complete: bool,
    pub read_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct HistoryRow {
    chapter_id: i64,
    manga_id: i64,
    manga_title: String,
    chapter_title: String,
    last_page_read: i64,
    is_complete: bool,
    read_at: i64,
}

impl TryFrom<HistoryRow> for History {
    type Error = Error;
    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            chapter_id: row.chapter_id,
            manga_id: row.manga_id,
            manga_title: row.manga_title,
            chapter_title: row.chapter_title,
            last_page_read: u32::try_from(row.last_page_read).or_raise(|| ErrorKind::InvalidData("last page read"))?,
            is_complete: row.is_complete,
            read_at: from_timestamp(row.read_at, "read date")?,
        })
    }
}

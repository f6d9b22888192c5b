use crate::error::{Error, ErrorKind};
use crate::models::ChapterId;
use exn::{OptionExt, ResultExt};
use hondana_extension::models::PageRef;

/// One page of a chapter. Ordinals run from zero without gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub chapter_id: ChapterId,
    pub ordinal: u32,
    pub reference: PageRef,
}

#[derive(sqlx::FromRow)]
pub(crate) struct PageRow {
    chapter_id: i64,
    ordinal: i64,
    kind: String,
    reference: String,
}

impl TryFrom<PageRow> for Page {
    type Error = Error;
    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            chapter_id: row.chapter_id,
            ordinal: u32::try_from(row.ordinal).or_raise(|| ErrorKind::InvalidData("page ordinal"))?,
            reference: PageRef::from_parts(&row.kind, row.reference).ok_or_raise(|| ErrorKind::InvalidData("page kind"))?,
        })
    }
}

mod chapter;
mod history;
mod manga;
mod page;
mod source;
mod update;

pub use self::chapter::{Chapter, ChapterDiff, ChapterId, ChapterSync};
pub(crate) use self::chapter::ChapterRow;
pub use self::history::History;
pub(crate) use self::history::HistoryRow;
pub use self::manga::{Manga, MangaId};
pub(crate) use self::manga::MangaRow;
pub use self::page::Page;
pub(crate) use self::page::PageRow;
pub use self::source::Source;
pub(crate) use self::source::SourceRow;
pub use self::update::{Update, UpdateId};
pub(crate) use self::update::UpdateRow;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::OffsetDateTime;

/// Timestamps are stored as whole seconds since the Unix epoch.
pub(crate) fn from_timestamp(seconds: i64, field: &'static str) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::InvalidData(field))
}

pub(crate) fn from_optional_timestamp(seconds: Option<i64>, field: &'static str) -> Result<Option<OffsetDateTime>> {
    seconds.map(|seconds| from_timestamp(seconds, field)).transpose()
}

use crate::error::{Error, ErrorKind};
use crate::models::{from_optional_timestamp, from_timestamp};
use exn::ResultExt;
use hondana_extension::models::MangaStatus;
use time::OffsetDateTime;

pub type MangaId = i64;

/// A work, as known through exactly one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manga {
    pub id: MangaId,
    pub source_key: String,
    /// Identifier assigned by the source; unique within it.
    pub provider_id: String,
    pub title: String,
    pub cover_url: Option<String>,
    pub status: MangaStatus,
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub genres: Vec<String>,
    pub is_favorite: bool,
    /// When the synchronizer last committed a chapter list for this manga.
    pub last_synced_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct MangaRow {
    id: i64,
    source_key: String,
    provider_id: String,
    title: String,
    cover_url: Option<String>,
    status: String,
    description: Option<String>,
    authors: String,
    genres: String,
    is_favorite: bool,
    last_synced_at: Option<i64>,
    created_at: i64,
}

impl TryFrom<MangaRow> for Manga {
    type Error = Error;
    fn try_from(row: MangaRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            source_key: row.source_key,
            provider_id: row.provider_id,
            title: row.title,
            cover_url: row.cover_url,
            status: MangaStatus::parse(&row.status),
            description: row.description,
            authors: serde_json::from_str(&row.authors).or_raise(|| ErrorKind::InvalidData("authors"))?,
            genres: serde_json::from_str(&row.genres).or_raise(|| ErrorKind::InvalidData("genres"))?,
            is_favorite: row.is_favorite,
            last_synced_at: from_optional_timestamp(row.last_synced_at, "last sync date")?,
            created_at: from_timestamp(row.created_at, "creation date")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> MangaRow {
        MangaRow {
            id: 7,
            source_key: "alpha".to_string(),
            provider_id: "m1".to_string(),
            title: "Moonlit".to_string(),
            cover_url: None,
            status: "completed".to_string(),
            description: Some("A story".to_string()),
            authors: r#"["A. Author"]"#.to_string(),
            genres: "[]".to_string(),
            is_favorite: true,
            last_synced_at: None,
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_row_to_model() {
        let manga = Manga::try_from(row()).unwrap();
        assert_eq!(manga.status, MangaStatus::Completed);
        assert_eq!(manga.authors, vec!["A. Author"]);
        assert_eq!(manga.created_at.unix_timestamp(), 1_700_000_000);
        assert!(manga.last_synced_at.is_none());
    }

    #[test]
    fn test_corrupt_json_column() {
        let mut row = row();
        row.genres = "action, drama".to_string();
        let err = Manga::try_from(row).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData("genres"));
    }
}

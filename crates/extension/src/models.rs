//! Values exchanged with a source through the capability contract.
//!
//! Every identifier in here is *provider-assigned*: the host never invents
//! one, it only stores what a source reported.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Paginated listing request. A `None` keyword lists the source's default
/// catalog (latest or popular, whatever the provider considers its front page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub keyword: Option<String>,
    /// One-based page number.
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

impl Default for ListQuery {
    fn default() -> Self {
        Self { keyword: None, page: first_page() }
    }
}

impl ListQuery {
    pub fn browse(page: u32) -> Self {
        Self { keyword: None, page: page.max(1) }
    }

    pub fn search(keyword: impl Into<String>, page: u32) -> Self {
        Self {
            keyword: Some(keyword.into()),
            page: page.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub cover_url: Option<String>,
}

impl MangaSummary {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            cover_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaDetail {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub status: MangaStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl MangaDetail {
    pub fn summary(&self) -> MangaSummary {
        MangaSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            cover_url: self.cover_url.clone(),
        }
    }
}

/// Publication status. Anything a provider reports that isn't recognised
/// becomes [`Unknown`](Self::Unknown) rather than an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MangaStatus {
    Ongoing,
    Completed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MangaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse, used for both provider payloads and stored rows.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "ongoing" | "publishing" => Self::Ongoing,
            "completed" | "finished" => Self::Completed,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub number: Option<f64>,
    /// Provider-reported publication time. Many providers don't report one.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

impl ChapterSummary {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            number: None,
            published_at: None,
        }
    }

    pub fn with_number(mut self, number: f64) -> Self {
        self.number = Some(number);
        self
    }

    pub fn published(mut self, at: OffsetDateTime) -> Self {
        self.published_at = Some(at);
        self
    }
}

/// A single page of a chapter: either a direct image URL, or an opaque token
/// the source knows how to turn into an image later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PageRef {
    Url(String),
    Token(String),
}

impl PageRef {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Token(_) => "token",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Url(value) | Self::Token(value) => value,
        }
    }

    pub fn from_parts(kind: &str, value: impl Into<String>) -> Option<Self> {
        match kind {
            "url" => Some(Self::Url(value.into())),
            "token" => Some(Self::Token(value.into())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Ongoing", MangaStatus::Ongoing)]
    #[case("publishing", MangaStatus::Ongoing)]
    #[case(" completed ", MangaStatus::Completed)]
    #[case("hiatus", MangaStatus::Unknown)]
    #[case("", MangaStatus::Unknown)]
    fn test_status_parse(#[case] input: &str, #[case] expected: MangaStatus) {
        assert_eq!(MangaStatus::parse(input), expected);
    }

    #[test]
    fn test_chapter_deserialize_with_and_without_timestamp() {
        let chapters: Vec<ChapterSummary> = serde_json::from_str(
            r#"[
                {"id": "c1", "title": "Chapter 1", "number": 1, "published_at": "2024-01-02T03:04:05Z"},
                {"id": "c2", "title": "Chapter 2"}
            ]"#,
        )
        .unwrap();
        assert_eq!(chapters[0].published_at.unwrap().unix_timestamp(), 1_704_164_645);
        assert_eq!(chapters[0].number, Some(1.0));
        assert!(chapters[1].published_at.is_none());
    }

    #[test]
    fn test_unknown_status_in_payload() {
        let detail: MangaDetail =
            serde_json::from_str(r#"{"id": "m1", "title": "M1", "status": "cancelled"}"#).unwrap();
        assert_eq!(detail.status, MangaStatus::Unknown);
        assert!(detail.authors.is_empty());
    }

    #[test]
    fn test_page_ref_parts() {
        let page: PageRef = serde_json::from_str(r#"{"kind": "token", "value": "abc"}"#).unwrap();
        assert_eq!(page, PageRef::Token("abc".to_string()));
        assert_eq!(PageRef::from_parts(page.kind(), page.value()), Some(page));
        assert_eq!(PageRef::from_parts("blob", "x"), None);
    }

    #[test]
    fn test_list_query_pages_start_at_one() {
        assert_eq!(ListQuery::browse(0).page, 1);
        assert_eq!(ListQuery::default().page, 1);
        let query: ListQuery = serde_json::from_str(r#"{"keyword": "moon"}"#).unwrap();
        assert_eq!(query, ListQuery::search("moon", 1));
    }
}

//! Content graph for hondana: sources, manga, chapters and pages synced from
//! extensions, plus the updates and reading history derived from them.
//!
//! Everything is persisted in SQLite through [`Database`]. [`Repository`]
//! is the read/write surface; [`SqliteDescriptorStore`] backs the extension
//! loader with the same `sources` table.

mod db;
pub mod error;
mod models;
mod repo;
mod store;

pub use crate::db::Database;
pub use crate::models::{Chapter, ChapterDiff, ChapterId, ChapterSync, History, Manga, MangaId, Page, Source, Update, UpdateId};
pub use crate::repo::Repository;
pub use crate::store::SqliteDescriptorStore;

//! Update synchronization for hondana.
//!
//! [`Synchronizer`] checks favorite manga against their sources and records
//! new chapters as updates; [`schedule::run_periodically`] repeats it.
//! [`Catalog`] serves the on-demand flows (browse, details, chapters, pages).

mod catalog;
pub mod error;
mod report;
pub mod schedule;
mod synchronizer;

pub use crate::catalog::Catalog;
pub use crate::report::{FailureKind, MangaOutcome, MangaReport, RunState, SourceReport, SyncReport};
pub use crate::synchronizer::{SyncOptions, Synchronizer};

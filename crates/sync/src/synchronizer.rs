use crate::error::{self, ErrorKind, Result};
use crate::report::{FailureKind, MangaOutcome, MangaReport, RunState, SourceReport, SyncReport};
use exn::ResultExt;
use futures::{StreamExt, stream};
use hondana_config::SyncConfig;
use hondana_extension::capability::error::{ErrorKind as CapabilityErrorKind, Result as CapabilityResult};
use hondana_extension::models::ChapterSummary;
use hondana_extension::{CapabilityHandle, ResolverHandle};
use hondana_graph::error::ErrorKind as GraphErrorKind;
use hondana_graph::{Manga, Repository};
use std::future::Future;
use std::pin::pin;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Concurrency and timeout knobs of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Sources synchronized at the same time.
    pub max_sources_in_flight: usize,
    /// Chapter-list calls in flight per source. `1` is serial.
    pub per_source_concurrency: usize,
    /// Bound on every capability call; exceeding it counts as
    /// [`FailureKind::SourceUnreachable`].
    pub call_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_sources_in_flight: 4,
            per_source_concurrency: 1,
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_sources_in_flight: config.max_sources_in_flight.max(1),
            per_source_concurrency: config.per_source_concurrency.max(1),
            call_timeout: config.call_timeout(),
        }
    }
}

/// Run a capability call under the configured timeout.
pub(crate) async fn bounded<T>(timeout: Duration, call: impl Future<Output = CapabilityResult<T>>) -> CapabilityResult<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(elapsed) => Err(elapsed).or_raise(|| CapabilityErrorKind::SourceUnreachable),
    }
}

/// Checks every favorite manga for new chapters.
///
/// Sources are synchronized concurrently (up to
/// [`SyncOptions::max_sources_in_flight`]); a source that can't be resolved
/// or a manga whose chapter list can't be fetched is recorded in the report
/// and never stops the rest of the run. Within a source, chapter lists may be
/// fetched concurrently but are committed one at a time in favorite order, so
/// the updates a run creates are ordered the same way every time.
///
/// Only one run at a time: a second concurrent [`run`](Self::run) fails with
/// [`ErrorKind::AlreadyRunning`].
pub struct Synchronizer {
    repo: Repository,
    resolver: ResolverHandle,
    options: SyncOptions,
    state: watch::Sender<RunState>,
}

impl Synchronizer {
    pub fn new(repo: Repository, resolver: ResolverHandle, options: SyncOptions) -> Self {
        Self {
            repo,
            resolver,
            options,
            state: watch::Sender::new(RunState::Idle),
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Watch state transitions of this synchronizer.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Run one synchronization over every favorite.
    ///
    /// Cancelling `cancel` stops dispatching new work. Chapter lists already
    /// being fetched are still committed; favorites never dispatched are
    /// listed as skipped and the report is marked cancelled.
    ///
    /// Fails only if the content graph can't be read or written. Whatever
    /// was committed before such a failure stays committed.
    #[instrument("sync run", skip_all)]
    pub async fn run(&self, cancel: &CancellationToken) -> Result<SyncReport> {
        let _run = RunGuard::start(&self.state)?;
        let started_at = OffsetDateTime::now_utc();

        let favorites = self.repo.list_favorites().await.map_err(error::graph)?;
        let groups = group_by_source(favorites);
        info!(sources = groups.len(), "starting sync run");

        let sources: Vec<_> = groups
            .iter()
            .map(|(key, mangas)| self.sync_source(key, mangas, cancel))
            .collect();
        let mut reports = Vec::with_capacity(groups.len());
        let mut dispatched = pin!(stream::iter(sources).buffered(self.options.max_sources_in_flight));
        while let Some(report) = dispatched.next().await {
            reports.push(report?);
        }

        let cancelled = cancel.is_cancelled();
        let state = if reports.iter().any(SourceReport::is_failed) {
            RunState::PartiallyFailed
        } else {
            RunState::Completed
        };
        let report = SyncReport {
            state,
            started_at,
            finished_at: OffsetDateTime::now_utc(),
            cancelled,
            sources: reports,
        };
        info!(state = %report.state, updates = report.updates(), cancelled, "sync run finished");
        self.state.send_replace(state);
        Ok(report)
    }

    #[instrument("sync source", skip(self, mangas, cancel), fields(favorites = mangas.len()))]
    async fn sync_source(&self, source: &str, mangas: &[Manga], cancel: &CancellationToken) -> Result<SourceReport> {
        let mut report = SourceReport::new(source);
        if cancel.is_cancelled() {
            report.skipped = mangas.iter().map(|manga| manga.id).collect();
            return Ok(report);
        }

        let capability = match self.resolver.resolve(source).await {
            Ok(capability) => capability,
            Err(err) => {
                let err = error::resolve(err);
                let &ErrorKind::Source(kind) = &*err else {
                    return Err(err);
                };
                warn!(source, kind = %kind, "could not resolve source");
                report.failure = Some(kind);
                return Ok(report);
            },
        };

        let fetches: Vec<_> = mangas
            .iter()
            .map(|manga| self.fetch_chapters(&capability, manga, cancel))
            .collect();
        let mut fetched = pin!(stream::iter(fetches).buffered(self.options.per_source_concurrency));
        while let Some((manga, chapters)) = fetched.next().await {
            let Some(chapters) = chapters else {
                report.skipped.push(manga.id);
                continue;
            };
            let outcome = match chapters {
                Ok(chapters) => self.commit(source, manga, &chapters).await?,
                Err(err) => {
                    let kind = FailureKind::from(&*err);
                    warn!(source, manga = %manga.provider_id, kind = %kind, "could not fetch chapter list");
                    MangaOutcome::Failed(kind)
                },
            };
            report.mangas.push(MangaReport {
                manga_id: manga.id,
                provider_id: manga.provider_id.clone(),
                outcome,
            });
        }
        Ok(report)
    }

    /// Fetch the chapter list of one favorite, unless the run was cancelled
    /// before its turn came.
    async fn fetch_chapters<'m>(
        &self,
        capability: &CapabilityHandle,
        manga: &'m Manga,
        cancel: &CancellationToken,
    ) -> (&'m Manga, Option<CapabilityResult<Vec<ChapterSummary>>>) {
        if cancel.is_cancelled() {
            return (manga, None);
        }
        let chapters = bounded(self.options.call_timeout, capability.chapter_list(&manga.provider_id)).await;
        (manga, Some(chapters))
    }

    /// Commit a fetched chapter list. A manga removed from the library since
    /// the run started is a failure of that manga only.
    async fn commit(&self, source: &str, manga: &Manga, chapters: &[ChapterSummary]) -> Result<MangaOutcome> {
        match self.repo.commit_chapter_sync(manga.id, chapters, OffsetDateTime::now_utc()).await {
            Ok(sync) => Ok(MangaOutcome::Synced {
                created: sync.diff.created.len(),
                updates: sync.updates.len(),
            }),
            Err(err) if matches!(&*err, GraphErrorKind::NotFound(_)) => {
                warn!(source, manga = %manga.provider_id, "manga was removed during the sync run");
                Ok(MangaOutcome::Failed(FailureKind::Removed))
            },
            Err(err) => Err(error::graph(err)),
        }
    }
}

/// Favorites arrive ordered by source key; keep that order and the order of
/// favorites within each source.
fn group_by_source(favorites: Vec<Manga>) -> Vec<(String, Vec<Manga>)> {
    let mut groups: Vec<(String, Vec<Manga>)> = Vec::new();
    for manga in favorites {
        match groups.last_mut() {
            Some((key, mangas)) if *key == manga.source_key => mangas.push(manga),
            _ => groups.push((manga.source_key.clone(), vec![manga])),
        }
    }
    groups
}

/// Holds the synchronizer in [`RunState::Running`]. Dropped without a
/// terminal state (fatal error, or the run future was dropped), it falls
/// back to [`RunState::Idle`].
struct RunGuard<'a> {
    state: &'a watch::Sender<RunState>,
}

impl<'a> RunGuard<'a> {
    fn start(state: &'a watch::Sender<RunState>) -> Result<Self> {
        let started = state.send_if_modified(|current| {
            if *current == RunState::Running {
                return false;
            }
            *current = RunState::Running;
            true
        });
        if !started {
            exn::bail!(ErrorKind::AlreadyRunning);
        }
        Ok(Self { state })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|current| {
            if *current != RunState::Running {
                return false;
            }
            *current = RunState::Idle;
            true
        });
    }
}

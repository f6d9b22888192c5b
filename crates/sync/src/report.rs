use derive_more::Display;
use hondana_extension::capability::error::ErrorKind as CapabilityErrorKind;
use hondana_extension::error::ErrorKind as ExtensionErrorKind;
use hondana_graph::MangaId;
use time::OffsetDateTime;

/// Where the synchronizer is in its `Idle → Running → {Completed,
/// PartiallyFailed}` cycle. A finished run can be followed by a new one.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    #[display("idle")]
    Idle,
    #[display("running")]
    Running,
    #[display("completed")]
    Completed,
    #[display("partially failed")]
    PartiallyFailed,
}

/// Why a source or a single manga could not be synchronized.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    #[display("not installed")]
    NotInstalled,
    #[display("incompatible extension")]
    Incompatible,
    #[display("source unreachable")]
    SourceUnreachable,
    #[display("source protocol error")]
    SourceProtocolError,
    #[display("rate limited")]
    RateLimited,
    /// The manga was removed from the library while the run was fetching it.
    #[display("removed during sync")]
    Removed,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceUnreachable | Self::RateLimited)
    }

    /// Classify a capability resolution failure. Store outages are not a
    /// per-source failure and must be handled before calling this.
    pub(crate) fn from_resolve(kind: &ExtensionErrorKind) -> Self {
        match kind {
            ExtensionErrorKind::IncompatibleExtension(_) => Self::Incompatible,
            ExtensionErrorKind::FetchFailed => Self::SourceUnreachable,
            _ => Self::NotInstalled,
        }
    }
}

impl From<&CapabilityErrorKind> for FailureKind {
    fn from(kind: &CapabilityErrorKind) -> Self {
        match kind {
            CapabilityErrorKind::SourceUnreachable => Self::SourceUnreachable,
            CapabilityErrorKind::SourceProtocolError => Self::SourceProtocolError,
            CapabilityErrorKind::RateLimited => Self::RateLimited,
            // Listings can't be missing; an extension saying otherwise broke its contract.
            CapabilityErrorKind::NotFound(_) => Self::SourceProtocolError,
        }
    }
}

/// Structured summary of one sync run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Either [`RunState::Completed`] or [`RunState::PartiallyFailed`].
    pub state: RunState,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    /// The run was cancelled before every favorite was dispatched.
    pub cancelled: bool,
    /// One entry per source with favorites, ordered by source key.
    pub sources: Vec<SourceReport>,
}

impl SyncReport {
    pub fn source(&self, key: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|source| source.source_key == key)
    }

    /// Number of updates recorded by the run.
    pub fn updates(&self) -> usize {
        self.sources.iter().flat_map(|source| &source.mangas).map(MangaReport::updates).sum()
    }

    /// Every failure of the run as `(source, manga, kind)`. `manga` is `None`
    /// for failures of a whole source.
    pub fn failures(&self) -> impl Iterator<Item = (&str, Option<&str>, FailureKind)> {
        self.sources.iter().flat_map(|source| {
            let own = source.failure.map(|kind| (source.source_key.as_str(), None, kind));
            let mangas = source.mangas.iter().filter_map(|manga| match manga.outcome {
                MangaOutcome::Failed(kind) => Some((source.source_key.as_str(), Some(manga.provider_id.as_str()), kind)),
                MangaOutcome::Synced { .. } => None,
            });
            own.into_iter().chain(mangas)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source_key: String,
    /// Set when the source's capability couldn't be resolved; none of its
    /// favorites were attempted.
    pub failure: Option<FailureKind>,
    /// Attempted favorites, in the order they were dispatched.
    pub mangas: Vec<MangaReport>,
    /// Favorites never dispatched because the run was cancelled.
    pub skipped: Vec<MangaId>,
}

impl SourceReport {
    pub(crate) fn new(source_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            failure: None,
            mangas: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some() || self.mangas.iter().any(|manga| matches!(manga.outcome, MangaOutcome::Failed(_)))
    }

    pub fn manga(&self, provider_id: &str) -> Option<&MangaReport> {
        self.mangas.iter().find(|manga| manga.provider_id == provider_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MangaReport {
    pub manga_id: MangaId,
    pub provider_id: String,
    pub outcome: MangaOutcome,
}

impl MangaReport {
    fn updates(&self) -> usize {
        match self.outcome {
            MangaOutcome::Synced { updates, .. } => updates,
            MangaOutcome::Failed(_) => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MangaOutcome {
    /// The chapter list was committed: `created` new chapters, `updates`
    /// new update rows.
    Synced { created: usize, updates: usize },
    Failed(FailureKind),
}

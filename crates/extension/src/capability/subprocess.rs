use crate::capability::SourceCapability;
use crate::capability::error::{ErrorKind, Result};
use crate::models::{ChapterSummary, ListQuery, MangaDetail, MangaSummary, PageRef};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Environment variable carrying the source's base endpoint to the child.
pub const ENDPOINT_ENV: &str = "HONDANA_SOURCE_ENDPOINT";

/// A source implemented by a local executable.
///
/// Each call spawns the command, writes one JSON request to its stdin, and
/// reads one JSON response from its stdout:
///
/// ```json
/// {"op": "chapter_list", "manga": "m1"}
/// {"ok": [{"id": "c1", "title": "Chapter 1"}]}
/// {"error": {"kind": "rate_limited"}}
/// ```
///
/// The child is killed if the call is dropped (on timeout, for example).
#[derive(Debug, Clone)]
pub struct SubprocessSource {
    key: String,
    command: PathBuf,
    args: Vec<String>,
    endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    ListManga { query: &'a ListQuery },
    MangaDetail { manga: &'a str },
    ChapterList { manga: &'a str },
    PageList { manga: &'a str, chapter: &'a str },
}

impl Request<'_> {
    /// What a `not_found` reply means for this request. Only a manga detail
    /// can be missing; for listings it is a malformed reply.
    fn not_found(&self) -> ErrorKind {
        match self {
            Self::MangaDetail { manga } => ErrorKind::NotFound(manga.to_string()),
            Self::ListManga { .. } | Self::ChapterList { .. } | Self::PageList { .. } => ErrorKind::SourceProtocolError,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Response<T> {
    Ok(T),
    Error {
        kind: RemoteFailure,
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RemoteFailure {
    Unreachable,
    Protocol,
    RateLimited,
    NotFound,
}

impl SubprocessSource {
    pub fn new(key: impl Into<String>, command: PathBuf, args: Vec<String>, endpoint: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            command,
            args,
            endpoint: endpoint.into(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, request: Request<'_>) -> Result<T> {
        let payload = serde_json::to_vec(&request).or_raise(|| ErrorKind::SourceProtocolError)?;
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .env(ENDPOINT_ENV, &self.endpoint)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .or_raise(|| ErrorKind::SourceUnreachable)?;

        let mut stdin = child.stdin.take().ok_or_raise(|| ErrorKind::SourceUnreachable)?;
        stdin.write_all(&payload).await.or_raise(|| ErrorKind::SourceUnreachable)?;
        stdin.shutdown().await.or_raise(|| ErrorKind::SourceUnreachable)?;
        drop(stdin);

        let output = child.wait_with_output().await.or_raise(|| ErrorKind::SourceUnreachable)?;
        if !output.status.success() {
            tracing::debug!(
                source = %self.key,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Source process failed"
            );
            exn::bail!(ErrorKind::SourceUnreachable);
        }

        match serde_json::from_slice::<Response<T>>(&output.stdout).or_raise(|| ErrorKind::SourceProtocolError)? {
            Response::Ok(value) => Ok(value),
            Response::Error { kind, message } => {
                tracing::debug!(source = %self.key, ?kind, message = message.as_deref(), "Source reported an error");
                exn::bail!(match kind {
                    RemoteFailure::Unreachable => ErrorKind::SourceUnreachable,
                    RemoteFailure::Protocol => ErrorKind::SourceProtocolError,
                    RemoteFailure::RateLimited => ErrorKind::RateLimited,
                    RemoteFailure::NotFound => request.not_found(),
                })
            },
        }
    }
}

#[async_trait]
impl SourceCapability for SubprocessSource {
    fn key(&self) -> &str {
        &self.key
    }

    async fn list_manga(&self, query: &ListQuery) -> Result<Vec<MangaSummary>> {
        self.call(Request::ListManga { query }).await
    }

    async fn manga_detail(&self, manga_id: &str) -> Result<MangaDetail> {
        self.call(Request::MangaDetail { manga: manga_id }).await
    }

    async fn chapter_list(&self, manga_id: &str) -> Result<Vec<ChapterSummary>> {
        self.call(Request::ChapterList { manga: manga_id }).await
    }

    async fn page_list(&self, manga_id: &str, chapter_id: &str) -> Result<Vec<PageRef>> {
        self.call(Request::PageList {
            manga: manga_id,
            chapter: chapter_id,
        })
        .await
    }
}

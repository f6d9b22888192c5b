//! Scripted transport for testing.

use crate::error::{ErrorKind, Result};
use crate::transport::{Outbound, Transport, Upstream};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use reqwest::StatusCode;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Answers from a table of canned responses and records every request.
///
/// URLs without a canned response are unreachable.
#[derive(Default)]
pub struct MockTransport {
    responses: RwLock<HashMap<String, (StatusCode, Option<String>, Vec<Bytes>)>>,
    requests: RwLock<Vec<Outbound>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `chunks` (in order) for `url`.
    pub async fn respond(&self, url: &str, status: StatusCode, content_type: Option<&str>, chunks: Vec<Bytes>) {
        self.responses
            .write()
            .await
            .insert(url.to_string(), (status, content_type.map(str::to_string), chunks));
    }

    pub async fn requests(&self) -> Vec<Outbound> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Outbound) -> Result<Upstream> {
        let url = request.url.to_string();
        self.requests.write().await.push(request);
        let Some((status, content_type, chunks)) = self.responses.read().await.get(&url).cloned() else {
            exn::bail!(ErrorKind::SourceUnreachable);
        };
        let content_length = chunks.iter().map(|chunk| chunk.len() as u64).sum();
        Ok(Upstream {
            status,
            content_type,
            content_length: Some(content_length),
            body: Box::pin(stream::iter(chunks.into_iter().map(Ok))),
        })
    }
}

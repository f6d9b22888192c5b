//! Outbound HTTP for the relay.
//!
//! The relay decides *what* to send; a [`Transport`] only sends it and hands
//! back the origin's response as a byte stream.

mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::http::HttpTransport;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockTransport;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send + 'static>>;
pub type TransportHandle = Arc<dyn Transport>;

/// A fully prepared outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub url: Url,
    pub headers: HeaderMap,
}

/// The origin's answer. The body is passed through untouched.
pub struct Upstream {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a `GET`. Only failing to reach the origin (or to start reading
    /// the response) is an error; any HTTP status is a valid answer.
    async fn send(&self, request: Outbound) -> Result<Upstream>;
}

use crate::capability::SourceCapability;
use crate::capability::error::{ErrorKind, Result};
use crate::descriptor::HeaderPolicy;
use crate::manifest::Operation;
use crate::models::{ChapterSummary, ListQuery, MangaDetail, MangaSummary, PageRef};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

/// A source served over HTTP as JSON.
///
/// Routes, relative to the runtime URL:
///
/// | Operation      | Route                                      |
/// |----------------|--------------------------------------------|
/// | `list_manga`   | `GET manga?page=N[&keyword=K]`             |
/// | `manga_detail` | `GET manga/{id}`                           |
/// | `chapter_list` | `GET manga/{id}/chapters`                  |
/// | `page_list`    | `GET manga/{id}/chapters/{chapter}/pages`  |
#[derive(Debug, Clone)]
pub struct RpcSource {
    key: String,
    base: Url,
    headers: HeaderMap,
    client: Client,
}

impl RpcSource {
    pub fn new(key: impl Into<String>, url: &str, policy: &HeaderPolicy, client: Client) -> crate::error::Result<Self> {
        let incompatible = |reason: &str| crate::error::ErrorKind::IncompatibleExtension(reason.to_string());
        let base = Url::parse(url).or_raise(|| incompatible("rpc url is not a valid url"))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            exn::bail!(incompatible("rpc url must be an http(s) url"));
        }
        let headers = policy.to_header_map().or_raise(|| incompatible("header policy is not valid http"))?;
        Ok(Self {
            key: key.into(),
            base,
            headers,
            client,
        })
    }

    fn route(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .ok()
            .ok_or_raise(|| ErrorKind::SourceProtocolError)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, operation: Operation, url: Url, subject: &str) -> Result<T> {
        tracing::debug!(source = %self.key, url = %url, ?operation, "Calling rpc source");
        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await
            .or_raise(|| ErrorKind::SourceUnreachable)?;
        if let Some(kind) = classify(response.status(), operation, subject) {
            exn::bail!(kind);
        }
        let body = response.bytes().await.or_raise(|| ErrorKind::SourceUnreachable)?;
        serde_json::from_slice(&body).or_raise(|| ErrorKind::SourceProtocolError)
    }
}

/// Map an HTTP status to the failure it stands for, if any.
///
/// Only a manga detail can be missing. A 404 from any other route means the
/// server doesn't follow the routing scheme.
fn classify(status: StatusCode, operation: Operation, subject: &str) -> Option<ErrorKind> {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Some(ErrorKind::RateLimited),
        StatusCode::NOT_FOUND if operation == Operation::MangaDetail => Some(ErrorKind::NotFound(subject.to_string())),
        status if status.is_server_error() => Some(ErrorKind::SourceUnreachable),
        status if !status.is_success() => Some(ErrorKind::SourceProtocolError),
        _ => None,
    }
}

#[async_trait]
impl SourceCapability for RpcSource {
    fn key(&self) -> &str {
        &self.key
    }

    async fn list_manga(&self, query: &ListQuery) -> Result<Vec<MangaSummary>> {
        let mut url = self.route(&["manga"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page", &query.page.to_string());
            if let Some(keyword) = &query.keyword {
                pairs.append_pair("keyword", keyword);
            }
        }
        self.fetch(Operation::ListManga, url, "manga").await
    }

    async fn manga_detail(&self, manga_id: &str) -> Result<MangaDetail> {
        self.fetch(Operation::MangaDetail, self.route(&["manga", manga_id])?, manga_id).await
    }

    async fn chapter_list(&self, manga_id: &str) -> Result<Vec<ChapterSummary>> {
        let url = self.route(&["manga", manga_id, "chapters"])?;
        self.fetch(Operation::ChapterList, url, manga_id).await
    }

    async fn page_list(&self, manga_id: &str, chapter_id: &str) -> Result<Vec<PageRef>> {
        let url = self.route(&["manga", manga_id, "chapters", chapter_id, "pages"])?;
        self.fetch(Operation::PageList, url, chapter_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn source(url: &str) -> RpcSource {
        RpcSource::new("alpha", url, &HeaderPolicy::default(), Client::new()).unwrap()
    }

    #[rstest]
    #[case("https://rpc.example", &["manga"], "https://rpc.example/manga")]
    #[case("https://rpc.example/v1/", &["manga", "m1", "chapters"], "https://rpc.example/v1/manga/m1/chapters")]
    #[case("https://rpc.example/v1", &["manga", "a/b"], "https://rpc.example/v1/manga/a%2Fb")]
    fn test_routes(#[case] base: &str, #[case] segments: &[&str], #[case] expected: &str) {
        assert_eq!(source(base).route(segments).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("not a url")]
    #[case("mailto:someone@example.com")]
    #[case("ftp://rpc.example")]
    fn test_rejects_invalid_urls(#[case] url: &str) {
        let err = RpcSource::new("alpha", url, &HeaderPolicy::default(), Client::new()).unwrap_err();
        assert!(matches!(*err, crate::error::ErrorKind::IncompatibleExtension(_)));
    }

    #[rstest]
    #[case(StatusCode::OK, None)]
    #[case(StatusCode::TOO_MANY_REQUESTS, Some(ErrorKind::RateLimited))]
    #[case(StatusCode::NOT_FOUND, Some(ErrorKind::NotFound("m1".to_string())))]
    #[case(StatusCode::BAD_GATEWAY, Some(ErrorKind::SourceUnreachable))]
    #[case(StatusCode::FORBIDDEN, Some(ErrorKind::SourceProtocolError))]
    fn test_classify(#[case] status: StatusCode, #[case] expected: Option<ErrorKind>) {
        assert_eq!(classify(status, Operation::MangaDetail, "m1"), expected);
    }

    #[rstest]
    #[case::list_manga(Operation::ListManga, ErrorKind::SourceProtocolError)]
    #[case::manga_detail(Operation::MangaDetail, ErrorKind::NotFound("m1".to_string()))]
    #[case::chapter_list(Operation::ChapterList, ErrorKind::SourceProtocolError)]
    #[case::page_list(Operation::PageList, ErrorKind::SourceProtocolError)]
    fn test_not_found_is_only_for_details(#[case] operation: Operation, #[case] expected: ErrorKind) {
        assert_eq!(classify(StatusCode::NOT_FOUND, operation, "m1"), Some(expected));
    }

    /// Serve every request with one canned HTTP response.
    async fn serve(status_line: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_missing_routes_stay_within_the_failure_kinds() {
        let source = source(&serve("404 Not Found").await);
        let err = source.list_manga(&ListQuery::browse(99)).await.unwrap_err();
        assert_eq!(*err, ErrorKind::SourceProtocolError);
        let err = source.chapter_list("m1").await.unwrap_err();
        assert_eq!(*err, ErrorKind::SourceProtocolError);
        let err = source.page_list("m1", "c1").await.unwrap_err();
        assert_eq!(*err, ErrorKind::SourceProtocolError);
        let err = source.manga_detail("m1").await.unwrap_err();
        assert_eq!(*err, ErrorKind::NotFound("m1".to_string()));
    }
}

use crate::error::{ErrorKind, Result};
use crate::transport::{Outbound, Transport, Upstream};
use async_trait::async_trait;
use exn::ResultExt;
use futures::StreamExt;
use hondana_config::RelayConfig;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

/// [`Transport`] over a [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client with the configured timeout. Redirects are followed, the
    /// spoofed headers along with them.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .or_raise(|| ErrorKind::SourceUnreachable)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Outbound) -> Result<Upstream> {
        let response = self
            .client
            .get(request.url)
            .headers(request.headers)
            .send()
            .await
            .or_raise(|| ErrorKind::SourceUnreachable)?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(Upstream {
            status: response.status(),
            content_type,
            content_length: response.content_length(),
            body: response.bytes_stream().map(|chunk| chunk.or_raise(|| ErrorKind::SourceUnreachable)).boxed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::TryStreamExt;
    use reqwest::header::{HeaderMap, HeaderValue, REFERER};
    use reqwest::{StatusCode, Url};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one connection, answer it with `response` and return the raw
    /// request head.
    async fn serve_once(response: &'static [u8]) -> (Url, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}/p1.jpg", listener.local_addr().unwrap())).unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|window| window == b"\r\n\r\n") {
                let read = socket.read(&mut buf).await.unwrap();
                assert!(read > 0, "connection closed before the request head ended");
                head.extend_from_slice(&buf[..read]);
            }
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8(head).unwrap()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn test_sends_headers_and_streams_body() {
        let (url, server) =
            serve_once(b"HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 4\r\nConnection: close\r\n\r\nPNG!").await;
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static("https://alpha.example"));

        let upstream = HttpTransport::new(Client::new()).send(Outbound { url, headers }).await.unwrap();
        assert_eq!(upstream.status, StatusCode::OK);
        assert_eq!(upstream.content_type.as_deref(), Some("image/png"));
        assert_eq!(upstream.content_length, Some(4));
        let body: Vec<Bytes> = upstream.body.try_collect().await.unwrap();
        assert_eq!(body.concat(), b"PNG!");

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("get /p1.jpg http/1.1\r\n"));
        assert!(request.contains("\r\nreferer: https://alpha.example\r\n"));
    }

    #[tokio::test]
    async fn test_unreachable_origin() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}/p1.jpg", listener.local_addr().unwrap())).unwrap();
        drop(listener);
        let err = HttpTransport::new(Client::new())
            .send(Outbound { url, headers: HeaderMap::new() })
            .await
            .unwrap_err();
        assert_eq!(*err, ErrorKind::SourceUnreachable);
    }
}

//! HTTP GET fetcher.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

use super::Fetcher;
use crate::error::FetchError;

/// Fetches a document with a GET request.
///
/// The client is built once, with the configured timeout and User-Agent applied to
/// every request.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    url: String,
    timeout: Duration,
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpFetcher {
    /// Create a fetcher for `url`.
    pub fn new(url: impl Into<String>, timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self) -> Result<Bytes, FetchError> {
        let transport = |source: reqwest::Error| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: self.url.clone(),
                    timeout: self.timeout,
                }
            } else {
                FetchError::Http {
                    url: self.url.clone(),
                    source,
                }
            }
        };

        let response = self.client.get(&self.url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status,
            });
        }

        response.bytes().await.map_err(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and hands back the raw request it received.
    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/CrConfig.json", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await.unwrap();
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        (url, handle)
    }

    #[tokio::test]
    async fn test_fetch_sends_user_agent_and_returns_body() {
        let (url, server) =
            serve_once("HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello").await;

        let fetcher = HttpFetcher::new(url, Duration::from_secs(5), "cdnroute-test/1.0").unwrap();
        let body = fetcher.fetch().await.unwrap();

        assert_eq!(body, Bytes::from_static(b"hello"));
        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("get /crconfig.json"));
        assert!(request.contains("user-agent: cdnroute-test/1.0"));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (url, _server) =
            serve_once("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;

        let fetcher = HttpFetcher::new(url, Duration::from_secs(5), "test").unwrap();
        let err = fetcher.fetch().await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status, .. } if status.as_u16() == 503));
    }

    #[tokio::test]
    async fn test_unresponsive_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/CrConfig.json", listener.local_addr().unwrap());
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });

        let fetcher = HttpFetcher::new(url, Duration::from_millis(200), "test").unwrap();
        let err = fetcher.fetch().await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout { timeout, .. } if timeout == Duration::from_millis(200)));
    }
}

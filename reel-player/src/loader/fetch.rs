//! Progressive fetch capability
//!
//! A fetch turns one resource reference into a finite stream of progress
//! events terminated by exactly one `Complete` or `Failed`. Streams are not
//! restartable; the loader opens one per manifest entry.

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("reel-player/", env!("CARGO_PKG_VERSION"));

/// Downloaded payload
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// One step of a progressive fetch
#[derive(Debug, Clone)]
pub enum FetchEvent {
    /// Bytes received so far; `total` only when the server reported it
    Progress { received: u64, total: Option<u64> },

    /// Terminal: download finished with a non-empty payload
    Complete(FetchedAsset),

    /// Terminal: network error, non-success status, or empty payload
    Failed(String),
}

impl FetchEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FetchEvent::Progress { .. })
    }
}

/// Source of progressive fetch streams
pub trait ProgressiveFetch: Send + Sync + 'static {
    fn fetch(&self, source_ref: &str) -> BoxStream<'static, FetchEvent>;
}

/// Drain a fetch stream into its payload
///
/// Used where only the result matters (the dataset document).
pub async fn fetch_to_end(
    fetcher: &dyn ProgressiveFetch,
    source_ref: &str,
) -> std::result::Result<FetchedAsset, String> {
    let mut stream = fetcher.fetch(source_ref);
    while let Some(event) = stream.next().await {
        match event {
            FetchEvent::Progress { .. } => {}
            FetchEvent::Complete(asset) => return Ok(asset),
            FetchEvent::Failed(reason) => return Err(reason),
        }
    }
    Err("fetch ended without a result".to_string())
}

/// HTTP GET fetcher
///
/// Relative references resolve against `base_url`; absolute URLs pass
/// through unchanged.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFetcher {
    pub fn new(base_url: &str) -> crate::Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| crate::Error::Config(format!("Invalid base_url '{}': {}", base_url, e)))?;

        // No overall request timeout: slow entries just under-contribute to
        // progress. Only connection setup is bounded.
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| crate::Error::Fetch(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Absolute URL for a reference
    pub fn url_for(&self, source_ref: &str) -> std::result::Result<Url, String> {
        self.base_url
            .join(source_ref)
            .map_err(|e| format!("invalid reference '{}': {}", source_ref, e))
    }
}

impl ProgressiveFetch for HttpFetcher {
    fn fetch(&self, source_ref: &str) -> BoxStream<'static, FetchEvent> {
        let client = self.client.clone();
        let url = self.url_for(source_ref);

        let stream = async_stream::stream! {
            let url = match url {
                Ok(url) => url,
                Err(reason) => {
                    yield FetchEvent::Failed(reason);
                    return;
                }
            };

            debug!(url = %url, "Starting fetch");

            let mut response = match client.get(url.clone()).send().await {
                Ok(response) => response,
                Err(e) => {
                    yield FetchEvent::Failed(format!("network error: {}", e));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                yield FetchEvent::Failed(format!("HTTP status {}", status.as_u16()));
                return;
            }

            let total = response.content_length().filter(|len| *len > 0);
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let mut bytes = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        bytes.extend_from_slice(&chunk);
                        yield FetchEvent::Progress { received: bytes.len() as u64, total };
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield FetchEvent::Failed(format!("body error: {}", e));
                        return;
                    }
                }
            }

            if bytes.is_empty() {
                yield FetchEvent::Failed("empty payload".to_string());
                return;
            }

            debug!(url = %url, bytes = bytes.len(), "Fetch complete");
            yield FetchEvent::Complete(FetchedAsset { bytes, content_type });
        };

        stream.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_refs_join_base() {
        let fetcher = HttpFetcher::new("http://127.0.0.1:3000").unwrap();
        assert_eq!(
            fetcher.url_for("/bg-video.mp4").unwrap().as_str(),
            "http://127.0.0.1:3000/bg-video.mp4"
        );
    }

    #[test]
    fn test_absolute_refs_pass_through() {
        let fetcher = HttpFetcher::new("http://127.0.0.1:3000").unwrap();
        assert_eq!(
            fetcher.url_for("https://cdn.example.com/a.mp3").unwrap().as_str(),
            "https://cdn.example.com/a.mp3"
        );
    }

    #[test]
    fn test_rejects_bad_base() {
        assert!(HttpFetcher::new("::nope").is_err());
    }

    #[test]
    fn test_terminal_events() {
        assert!(!FetchEvent::Progress { received: 1, total: None }.is_terminal());
        assert!(FetchEvent::Failed("x".into()).is_terminal());
    }
}

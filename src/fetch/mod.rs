//! Match feed sources.
//!
//! The feed is either fetched from the match-history endpoint or read from
//! a static JSON snapshot. A load either yields the whole feed or an
//! error; a failed load never hands back partial data.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::models::MatchFeed;

/// Errors that can occur while loading the feed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rate limited by {host}, retry after {retry_after_secs}s")]
    RateLimited { host: String, retry_after_secs: u64 },

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Anything that can produce the raw match list.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Human-readable origin, for logs and the overview endpoint.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<MatchFeed, FetchError>;
}

/// Configuration for the HTTP source.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub url: Url,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page_size: u32,
    pub max_pages: u32,
    pub timeout: Duration,
    pub user_agent: String,
}

impl FetcherConfig {
    pub fn from_source(source: &SourceConfig) -> Result<Self, FetchError> {
        let url = Url::parse(&source.url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", source.url, e)))?;
        Ok(Self {
            url,
            start_date: source.start_date.clone(),
            end_date: source.end_date.clone(),
            page_size: source.page_size.max(1),
            max_pages: source.max_pages.max(1),
            timeout: Duration::from_secs(source.timeout_seconds),
            user_agent: source.user_agent.clone(),
        })
    }
}

/// Pages through the match-history endpoint.
pub struct HttpMatchSource {
    client: Client,
    config: FetcherConfig,
}

impl HttpMatchSource {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("inhouse-stats")),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// URL for one page (1-based). Query parameters already present on
    /// the configured URL are replaced.
    fn page_url(&self, page: u32) -> Url {
        let managed = ["start_date", "end_date", "page_size", "limit", "page", "order"];
        let kept: Vec<(String, String)> = self
            .config
            .url
            .query_pairs()
            .filter(|(k, _)| !managed.iter().any(|m| k == m))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut url = self.config.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (k, v) in &kept {
                query.append_pair(k, v);
            }
            if let Some(start) = &self.config.start_date {
                query.append_pair("start_date", start);
            }
            if let Some(end) = &self.config.end_date {
                query.append_pair("end_date", end);
            }
            let page_size = self.config.page_size.to_string();
            query.append_pair("page_size", &page_size);
            query.append_pair("limit", &page_size);
            query.append_pair("page", &page.to_string());
            query.append_pair("order", "asc");
        }
        url
    }

    async fn fetch_page(&self, url: &Url) -> Result<MatchFeed, FetchError> {
        debug!("Fetching {}", url);
        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(FetchError::RateLimited {
                host: url.host_str().unwrap_or("unknown").to_string(),
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.text().await?;
        Ok(MatchFeed::from_json_str(&body)?)
    }
}

#[async_trait]
impl MatchSource for HttpMatchSource {
    fn describe(&self) -> String {
        self.config.url.to_string()
    }

    async fn load(&self) -> Result<MatchFeed, FetchError> {
        let mut pages: Vec<MatchFeed> = Vec::new();

        for page in 1..=self.config.max_pages {
            let feed = self.fetch_page(&self.page_url(page)).await?;
            let received = feed.len() + feed.skipped;

            // An endpoint that ignores `page` keeps returning the first page.
            if pages
                .last()
                .is_some_and(|prev| prev.fingerprint == feed.fingerprint)
            {
                debug!("Page {} repeats the previous page, stopping", page);
                break;
            }

            pages.push(feed);
            if received < self.config.page_size as usize {
                break;
            }
            if page == self.config.max_pages {
                warn!(
                    "Stopped after {} pages; the feed may be truncated",
                    self.config.max_pages
                );
            }
        }

        let feed = MatchFeed::from_pages(pages);
        info!(
            "Fetched {} matches ({} malformed) from {}",
            feed.len(),
            feed.skipped,
            self.config.url
        );
        Ok(feed)
    }
}

/// Reads a static JSON snapshot of the feed.
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl MatchSource for SnapshotSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<MatchFeed, FetchError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let feed = MatchFeed::from_json_str(&content)?;
        info!(
            "Loaded {} matches ({} malformed) from {}",
            feed.len(),
            feed.skipped,
            self.path.display()
        );
        Ok(feed)
    }
}

/// Pick the configured source: a snapshot when one is set, otherwise the
/// HTTP endpoint.
pub fn source_from_config(source: &SourceConfig) -> Result<Arc<dyn MatchSource>, FetchError> {
    match &source.snapshot_path {
        Some(path) => Ok(Arc::new(SnapshotSource::new(path.clone()))),
        None => Ok(Arc::new(HttpMatchSource::new(FetcherConfig::from_source(source)?)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn http_source(url: &str) -> HttpMatchSource {
        let source = SourceConfig {
            url: url.to_string(),
            start_date: Some("2025-09-08".to_string()),
            end_date: None,
            page_size: 500,
            ..Default::default()
        };
        HttpMatchSource::new(FetcherConfig::from_source(&source).unwrap()).unwrap()
    }

    #[test]
    fn test_page_url() {
        let source = http_source("https://api.example.com/api/v1/history/42");
        let url = source.page_url(3);

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("start_date".to_string(), "2025-09-08".to_string())));
        assert!(pairs.contains(&("page_size".to_string(), "500".to_string())));
        assert!(pairs.contains(&("page".to_string(), "3".to_string())));
        assert!(pairs.contains(&("order".to_string(), "asc".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "end_date"));
    }

    #[test]
    fn test_page_url_replaces_managed_params() {
        let source = http_source("https://api.example.com/history?page_size=1000&token=abc&page=9");
        let url = source.page_url(1);

        let page_sizes: Vec<String> = url
            .query_pairs()
            .filter(|(k, _)| k == "page_size")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(page_sizes, vec!["500".to_string()]);
        assert!(url.query_pairs().any(|(k, v)| k == "token" && v == "abc"));
        assert!(url.query_pairs().any(|(k, v)| k == "page" && v == "1"));
    }

    #[test]
    fn test_invalid_url() {
        let source = SourceConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            FetcherConfig::from_source(&source),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_snapshot_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all-stats.json");
        std::fs::write(
            &path,
            r#"{"data": [{"game": "dota", "time": "2025-09-10T19:30:00Z", "winner": 0,
                "teams": [[{"id": "1", "name": "a", "mmr": 1000}], [{"id": "2", "name": "b", "mmr": 1000}]]},
               {"bogus": true, "teams": 5}]}"#,
        )
        .unwrap();

        let source = SnapshotSource::new(path.clone());
        let feed = tokio_test::block_on(source.load()).unwrap();

        assert_eq!(feed.len(), 1);
        assert_eq!(feed.skipped, 1);
        assert_eq!(source.describe(), path.display().to_string());
    }

    #[tokio::test]
    async fn test_snapshot_missing_file() {
        let source = SnapshotSource::new(PathBuf::from("/nonexistent/feed.json"));
        assert!(matches!(source.load().await, Err(FetchError::Io(_))));
    }

    #[tokio::test]
    async fn test_snapshot_not_a_feed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[]").unwrap();

        let source = SnapshotSource::new(path);
        assert!(matches!(source.load().await, Err(FetchError::Json(_))));
    }

    #[test]
    fn test_source_from_config_prefers_snapshot() {
        let config = SourceConfig {
            snapshot_path: Some(PathBuf::from("snap.json")),
            ..Default::default()
        };
        let source = source_from_config(&config).unwrap();
        assert_eq!(source.describe(), "snap.json");

        let source = source_from_config(&SourceConfig::default()).unwrap();
        assert!(source.describe().starts_with("https://"));
    }
}

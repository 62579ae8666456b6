//! HTTP fetcher implementation
//!
//! This module handles retrieving page bodies for the crawler, including:
//! - Building the HTTP client with the configured user agent
//! - The [`Fetcher`] seam the coordinator drives (HTTP in production,
//!   in-memory link graphs in tests)
//! - Classifying transport failures
//! - The fetch-and-parse step that turns a URL into a record plus raw links

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::parser::{parse_page, ParsedPage, PageSelectors};
use crate::url::CanonicalUrl;
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a single page contributed nothing to the crawl
///
/// None of these abort the crawl; the coordinator logs and counts them.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("Expected HTML from {url}, got {content_type}")]
    NotHtml { url: String, content_type: String },
}

/// A successfully retrieved response body
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects; links on the page resolve against it
    pub final_url: Url,

    /// `Content-Type` header, if the server sent one
    pub content_type: Option<String>,

    pub body: Vec<u8>,
}

impl FetchedPage {
    /// An HTML page served from `url` without redirects
    pub fn html(url: &CanonicalUrl, body: impl Into<Vec<u8>>) -> Self {
        Self {
            final_url: url.as_url().clone(),
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.into(),
        }
    }

    fn is_html(&self) -> bool {
        match &self.content_type {
            None => true,
            Some(value) => {
                let mime = value
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase();
                mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
            }
        }
    }
}

/// Retrieves the body behind a URL
///
/// Implementations must be cheap to share across tasks; the coordinator holds
/// one behind an `Arc` and calls it from every fetch task.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &CanonicalUrl) -> Result<FetchedPage, FetchError>;
}

/// [`Fetcher`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the client from configuration and wraps it
    pub fn from_config(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        build_http_client(crawler, user_agent).map(Self::new)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &CanonicalUrl) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| classify_error(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        Ok(FetchedPage {
            final_url,
            content_type,
            body: body.to_vec(),
        })
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `crawler` - Timeout and redirect limits
/// * `user_agent` - The user agent identification
///
/// # Example
///
/// ```no_run
/// use ripple_harvest::config::Config;
/// use ripple_harvest::crawler::build_http_client;
///
/// let config = Config::default();
/// let client = build_http_client(&config.crawler, &config.user_agent).unwrap();
/// ```
pub fn build_http_client(
    crawler: &CrawlerConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(crawler.fetch_timeout_secs);

    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(crawler.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a `reqwest` send error onto the fetch failure taxonomy
fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else if error.is_redirect() {
        FetchError::Network {
            url: url.to_string(),
            message: "Too many redirects".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// Fetches one page and extracts its record and raw links
///
/// # Returns
///
/// * `Ok(ParsedPage)` - The record (keyed by the final URL) and every raw href
/// * `Err(FetchError)` - Transport failure, non-2xx status or non-HTML body;
///   the page contributes nothing
pub async fn fetch_and_parse<F>(
    fetcher: &F,
    url: &CanonicalUrl,
    selectors: &PageSelectors,
) -> Result<ParsedPage, FetchError>
where
    F: Fetcher + ?Sized,
{
    let page = fetcher.fetch(url).await?;

    if !page.is_html() {
        return Err(FetchError::NotHtml {
            url: url.to_string(),
            content_type: page.content_type.unwrap_or_default(),
        });
    }

    let html = String::from_utf8_lossy(&page.body);
    Ok(parse_page(&html, &page.final_url, selectors))
}

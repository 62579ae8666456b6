use serde::Deserialize;

/// Main configuration structure for Ripple-Harvest
///
/// Every section is optional; a missing file or an empty file yields the
/// defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    pub selectors: SelectorConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of fetch tasks running at the same time
    pub max_concurrent_fetches: usize,

    /// Per-fetch timeout (seconds)
    pub fetch_timeout_secs: u64,

    /// Maximum number of redirects followed for one fetch
    pub max_redirects: usize,

    /// Maximum link distance from the seed; `None` crawls without a limit
    pub max_depth: Option<u32>,

    /// Host patterns links may lead into; empty means any host
    pub allowed_domains: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 8,
            fetch_timeout_secs: 30,
            max_redirects: 10,
            max_depth: None,
            allowed_domains: Vec::new(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    pub crawler_name: String,
    pub crawler_version: String,
    /// URL with information about the crawler
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "RippleHarvest".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the `User-Agent` header: `Name/Version` or `Name/Version (+URL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(url) => format!("{}/{} (+{})", self.crawler_name, self.crawler_version, url),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path of the CSV file the records are written to
    pub csv_path: String,

    /// Write a `url,title,author,date` header row before the records
    pub write_header: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: "/tmp/output.csv".to_string(),
            write_header: false,
        }
    }
}

/// CSS selectors used to pull metadata out of each page
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub title: String,
    pub author: String,
    pub date: String,
    /// Elements whose `href` attribute is followed
    pub links: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            title: ".the-article-title".to_string(),
            author: ".author".to_string(),
            date: ".the-article-publish".to_string(),
            links: "a[href]".to_string(),
        }
    }
}

//! HTML parser for extracting article metadata and raw links
//!
//! This module turns a page body into:
//! - A [`PageRecord`] holding the URL, title, author and publish date
//! - The raw `href` values found on link elements, unresolved

use crate::config::{compile_selector, SelectorConfig};
use crate::ConfigResult;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Value stored in a record field when its selector matches nothing
pub const EMPTY_FIELD: &str = "empty";

/// One extracted row of crawl output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub author: String,
    pub date: String,
}

impl PageRecord {
    /// A record for `url` with every metadata field set to [`EMPTY_FIELD`]
    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: EMPTY_FIELD.to_string(),
            author: EMPTY_FIELD.to_string(),
            date: EMPTY_FIELD.to_string(),
        }
    }

    /// The four output columns in their fixed order
    pub fn as_row(&self) -> [&str; 4] {
        [&self.url, &self.title, &self.author, &self.date]
    }
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub record: PageRecord,

    /// URL the page was served from; relative links resolve against it
    pub base_url: Url,

    /// Raw `href` attribute values in document order
    pub links: Vec<String>,
}

/// Compiled selectors for the metadata fields and for link elements
#[derive(Debug, Clone)]
pub struct PageSelectors {
    title: Selector,
    author: Selector,
    date: Selector,
    links: Selector,
}

impl PageSelectors {
    /// Compiles the configured selectors
    ///
    /// # Returns
    ///
    /// * `Ok(PageSelectors)` - All four selectors compiled
    /// * `Err(ConfigError::InvalidSelector)` - One of them is not valid CSS
    pub fn from_config(config: &SelectorConfig) -> ConfigResult<Self> {
        Ok(Self {
            title: compile_selector("title", &config.title)?,
            author: compile_selector("author", &config.author)?,
            date: compile_selector("date", &config.date)?,
            links: compile_selector("links", &config.links)?,
        })
    }
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self::from_config(&SelectorConfig::default())
            .unwrap_or_else(|e| unreachable!("default selectors are valid CSS: {e}"))
    }
}

/// Parses a page body into a record and its outbound hrefs
///
/// Each metadata field takes the trimmed text of the FIRST element matching
/// its selector. A field with no match, or whose first match has no visible
/// text, is [`EMPTY_FIELD`]. Parsing never fails: malformed markup is
/// repaired by the HTML5 parser and absent elements are an expected outcome.
///
/// # Example
///
/// ```
/// use ripple_harvest::crawler::{parse_page, PageSelectors, EMPTY_FIELD};
/// use url::Url;
///
/// let html = r#"<h1 class="the-article-title">Hello</h1><a href="/next">next</a>"#;
/// let url = Url::parse("https://a.test/").unwrap();
/// let parsed = parse_page(html, &url, &PageSelectors::default());
/// assert_eq!(parsed.record.title, "Hello");
/// assert_eq!(parsed.record.author, EMPTY_FIELD);
/// assert_eq!(parsed.links, vec!["/next".to_string()]);
/// ```
pub fn parse_page(html: &str, url: &Url, selectors: &PageSelectors) -> ParsedPage {
    let document = Html::parse_document(html);

    let record = PageRecord {
        url: url.to_string(),
        title: first_text(&document, &selectors.title),
        author: first_text(&document, &selectors.author),
        date: first_text(&document, &selectors.date),
    };

    let links = document
        .select(&selectors.links)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect();

    ParsedPage {
        record,
        base_url: url.clone(),
        links,
    }
}

fn first_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| EMPTY_FIELD.to_string())
}

/// Concatenated text of an element with runs of whitespace collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

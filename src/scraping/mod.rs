mod clean;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;
use url::Url;

use crate::core::config::SCRAPE_TIMEOUT;
use crate::core::error::{AtlasError, Result};

/// Seam for the URL→article step so the pipeline is testable without a
/// network. [`ArticleScraper`] is the production implementation.
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch_article(&self, url: &str) -> Result<String>;
}

/// Minimum article body length after cleaning; anything shorter is treated
/// as an extraction failure rather than a usable document.
pub const MIN_ARTICLE_CHARS: usize = 200;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Readability-style article scraper: fetch a URL, strip boilerplate DOM,
/// extract the main content as plain text.
pub struct ArticleScraper {
    client: Client,
}

impl ArticleScraper {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(SCRAPE_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    /// Fetch `url` and reduce it to a plain-text article body.
    pub async fn scrape_article(&self, url: &str) -> Result<String> {
        let parsed_url = Url::parse(url)
            .map_err(|e| AtlasError::UrlFetch(format!("invalid URL '{url}': {e}")))?;
        if parsed_url.scheme() != "http" && parsed_url.scheme() != "https" {
            return Err(AtlasError::UrlFetch(format!(
                "unsupported scheme '{}'",
                parsed_url.scheme()
            )));
        }

        let response = self
            .client
            .get(parsed_url.clone())
            .header("User-Agent", USER_AGENT)
            .header("Accept", "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| AtlasError::UrlFetch(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AtlasError::UrlFetch(format!(
                "{url} answered with status {status}"
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();
        if !content_type.contains("html") {
            return Err(AtlasError::UrlFetch(format!(
                "{url} is not an HTML document ({content_type})"
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AtlasError::UrlFetch(format!("reading body of {url} failed: {e}")))?;

        let body = self.extract_article(&html, &parsed_url)?;
        info!(
            "scraped {} ({} chars of article body)",
            url,
            body.chars().count()
        );
        Ok(body)
    }

    /// Reduce raw HTML to a clean article body. Pure, so the extraction
    /// pipeline is testable without a network.
    pub fn extract_article(&self, html: &str, base_url: &Url) -> Result<String> {
        let pre = self.pre_clean(html);

        // Readability pass and heuristic main-container scan, arbitrated by
        // word count. Readability wins ties; the heuristic must beat it by a
        // clear margin to be trusted.
        let readability_text = self.readability_pass(&pre, base_url);
        let heuristic_text = self.heuristic_main_extraction(&pre);

        let rt_words = count_words(&readability_text);
        let ht_words = count_words(&heuristic_text);
        let chosen = if rt_words == 0 && ht_words > 0 {
            heuristic_text
        } else if ht_words > rt_words.saturating_add(20) {
            heuristic_text
        } else {
            readability_text
        };

        let body = self.post_clean(&chosen);
        if body.chars().count() < MIN_ARTICLE_CHARS {
            return Err(AtlasError::ContentExtraction(format!(
                "article body too short ({} chars) after extraction",
                body.chars().count()
            )));
        }
        Ok(body)
    }
}

impl Default for ArticleScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleFetcher for ArticleScraper {
    async fn fetch_article(&self, url: &str) -> Result<String> {
        self.scrape_article(url).await
    }
}

pub(crate) fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

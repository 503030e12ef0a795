//! Web content fetching with bounded retries
//!
//! Fetches URL content for ingestion: GET with exponential backoff on a
//! fixed set of retryable statuses, HTML-to-text extraction, and HEAD
//! based size estimation for the ingestion manifest.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::constants::{
    DEFAULT_URL_SIZE_ESTIMATE, FETCH_BACKOFF_BASE_MS, FETCH_MAX_RETRIES, RETRYABLE_STATUS,
};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Elements whose text is worth keeping when flattening HTML.
const CONTENT_SELECTOR: &str = "p, h1, h2, h3, h4, h5, h6, li, blockquote, article, pre, td, th";

pub struct ContentFetcher {
    client: reqwest::Client,
}

impl ContentFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// URL format and protocol check: http/https with a host.
    pub fn is_valid_url(url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => {
                matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
            }
            Err(_) => false,
        }
    }

    /// Fetch a URL and return its readable text content.
    ///
    /// Retries up to [`FETCH_MAX_RETRIES`] times with exponential
    /// backoff on retryable statuses (429, 500, 502, 503, 504) and on
    /// connect/timeout errors.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        if !Self::is_valid_url(url) {
            bail!("invalid URL format: {url}");
        }

        let mut attempt: u32 = 0;
        loop {
            let outcome = self.client.get(url).send().await;

            match outcome {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let is_html = response
                            .headers()
                            .get(reqwest::header::CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .map(|ct| ct.contains("text/html"))
                            .unwrap_or(true);

                        let body = response.text().await.context("failed to read body")?;
                        let text = if is_html {
                            extract_html_text(&body)
                        } else {
                            clean_text(&body)
                        };

                        if text.trim().is_empty() {
                            bail!("no text content extracted from {url}");
                        }
                        debug!(url, bytes = text.len(), "Fetched URL content");
                        return Ok(text);
                    }

                    if RETRYABLE_STATUS.contains(&status.as_u16()) && attempt < FETCH_MAX_RETRIES {
                        attempt += 1;
                        let backoff = FETCH_BACKOFF_BASE_MS * 2u64.pow(attempt - 1);
                        warn!(url, %status, attempt, "Retryable status, backing off {backoff}ms");
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                        continue;
                    }

                    bail!("fetch failed for {url}: status {status}");
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < FETCH_MAX_RETRIES => {
                    attempt += 1;
                    let backoff = FETCH_BACKOFF_BASE_MS * 2u64.pow(attempt - 1);
                    warn!(url, error = %e, attempt, "Transient fetch error, backing off {backoff}ms");
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e).context(format!("fetch failed for {url}")),
            }
        }
    }

    /// Estimate content size without downloading the body. Falls back to
    /// an average page size when HEAD gives no content length.
    pub async fn estimate_size(&self, url: &str) -> u64 {
        if !Self::is_valid_url(url) {
            return 0;
        }

        match self.client.head(url).send().await {
            Ok(response) => response
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_URL_SIZE_ESTIMATE),
            Err(e) => {
                debug!(url, error = %e, "HEAD failed, using default size estimate");
                DEFAULT_URL_SIZE_ESTIMATE
            }
        }
    }
}

/// Flatten HTML into readable text, keeping content elements only.
fn extract_html_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut parts: Vec<String> = Vec::new();
    if let Ok(selector) = Selector::parse(CONTENT_SELECTOR) {
        for element in document.select(&selector) {
            let text = element.text().collect::<Vec<_>>().join(" ");
            let text = text.trim();
            if !text.is_empty() {
                parts.push(text.to_string());
            }
        }
    }

    if parts.is_empty() {
        // Markup without content elements: fall back to all text nodes
        let text = document.root_element().text().collect::<Vec<_>>().join(" ");
        return clean_text(&text);
    }

    clean_text(&parts.join("\n"))
}

/// Collapse runs of whitespace and drop empty lines.
fn clean_text(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();

    let mut out: Vec<&str> = Vec::new();
    let mut last_empty = false;
    for line in &lines {
        if line.is_empty() {
            if !last_empty && !out.is_empty() {
                out.push("");
            }
            last_empty = true;
        } else {
            out.push(line);
            last_empty = false;
        }
    }

    out.join("\n").trim().to_string()
}

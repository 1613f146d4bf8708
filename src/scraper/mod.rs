//! Fetching and extraction: the authenticated client, the fetcher seam, and the ESJ Zone extractor.

mod client;
mod error;

pub mod esjzone;

pub use client::{Credentials, SessionClient, SessionClientBuilder};
pub use error::{ErrorKind, ScraperError};

use async_trait::async_trait;
use reqwest::Url;

/// Source of remote pages and images.
///
/// Implemented by [SessionClient]; pipelines hold it as `Arc<dyn Fetcher>` so tests can
/// substitute an in-memory site.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, ScraperError>;
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScraperError>;
}

/// Resolve `href` against `base`. Absolute hrefs are returned normalized.
pub fn resolve_link(base: &str, href: &str) -> Result<String, ScraperError> {
    let base_url = Url::parse(base).map_err(|e| ScraperError::InvalidUrl {
        input: base.to_string(),
        reason: e.to_string(),
    })?;
    base_url
        .join(href.trim())
        .map(|u| u.to_string())
        .map_err(|e| ScraperError::InvalidUrl {
            input: href.to_string(),
            reason: e.to_string(),
        })
}

/// Require an http(s) URL with a host. Used to validate listing URLs before scheduling.
pub fn validate_listing_url(input: &str) -> Result<String, ScraperError> {
    let url = Url::parse(input.trim()).map_err(|e| ScraperError::InvalidUrl {
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ScraperError::InvalidUrl {
            input: input.to_string(),
            reason: "URL must be http or https".to_string(),
        });
    }
    if url.host_str().is_none() {
        return Err(ScraperError::InvalidUrl {
            input: input.to_string(),
            reason: "URL has no host".to_string(),
        });
    }
    Ok(url.to_string())
}

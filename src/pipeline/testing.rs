//! In-memory site used by the pipeline unit tests.

use crate::scraper::{Fetcher, ScraperError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
enum Route {
    Body { bytes: Vec<u8>, delay_ms: u64 },
    Timeout,
}

#[derive(Clone, Default)]
pub(crate) struct FakeSite {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl FakeSite {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn shared(&self) -> Arc<dyn Fetcher> {
        Arc::new(self.clone())
    }

    pub(crate) fn page(&self, url: &str, html: &str) {
        self.page_delayed(url, html, 0);
    }

    pub(crate) fn page_delayed(&self, url: &str, html: &str, delay_ms: u64) {
        self.bytes_delayed(url, html.as_bytes(), delay_ms);
    }

    pub(crate) fn bytes(&self, url: &str, bytes: &[u8]) {
        self.bytes_delayed(url, bytes, 0);
    }

    pub(crate) fn bytes_delayed(&self, url: &str, bytes: &[u8], delay_ms: u64) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Route::Body {
                bytes: bytes.to_vec(),
                delay_ms,
            },
        );
    }

    /// Requests to `url` fail with a timeout.
    pub(crate) fn timeout(&self, url: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route::Timeout);
    }

    pub(crate) fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    async fn respond(&self, url: &str) -> Result<Vec<u8>, ScraperError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
        let route = self.routes.lock().unwrap().get(url).cloned();
        match route {
            Some(Route::Body { bytes, delay_ms }) => {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Ok(bytes)
            }
            Some(Route::Timeout) => Err(ScraperError::Timeout {
                url: url.to_string(),
            }),
            None => Err(ScraperError::HttpStatus {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Fetcher for FakeSite {
    async fn fetch_text(&self, url: &str) -> Result<String, ScraperError> {
        let bytes = self.respond(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScraperError> {
        self.respond(url).await
    }
}

/// Listing page in the site's markup.
pub(crate) fn listing_page(title: &str, author: &str, cover: Option<&str>, links: &[String]) -> String {
    let cover = cover
        .map(|c| {
            format!(
                r#"<div class="product-gallery text-center mb-3"><a href="{}">cover</a></div>"#,
                c
            )
        })
        .unwrap_or_default();
    let links: String = links
        .iter()
        .map(|l| format!(r#"<a href="{}"><p>chapter</p></a>"#, l))
        .collect();
    format!(
        r#"<html><body>{cover}<h2 class="p-t-10 text-normal">{title}</h2>
<ul class="list-unstyled mb-2 book-detail"><li><a href="/a">{author}</a></li></ul>
<div id="chapterList">{links}</div></body></html>"#
    )
}

/// Chapter page in the site's markup; `content` goes inside the content block.
pub(crate) fn chapter_page(title: &str, content: &str) -> String {
    format!(
        r#"<html><body><div class="col-xl-9 col-lg-8 p-r-30"><h2>{title}</h2>
<div class="forum-content mt-3"><p>{title} text.</p>{content}</div></div></body></html>"#
    )
}

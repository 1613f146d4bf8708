//! Async HTTP client that attaches the site session cookies to every request.

use crate::scraper::{Fetcher, ScraperError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use std::time::Duration;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// The two static session tokens issued by the site after login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub ews_key: String,
    pub ews_token: String,
}

impl Credentials {
    pub fn new(ews_key: impl Into<String>, ews_token: impl Into<String>) -> Self {
        Self {
            ews_key: ews_key.into(),
            ews_token: ews_token.into(),
        }
    }

    /// Value for the `Cookie` request header.
    pub fn cookie_header(&self) -> String {
        format!("ews_key={}; ews_token={}", self.ews_key, self.ews_token)
    }
}

/// Authenticated client. One attempt per request; no retry.
///
/// Cheap to share behind an `Arc`; `reqwest::Client` pools connections internally.
#[derive(Debug, Clone)]
pub struct SessionClient {
    inner: reqwest::Client,
}

impl SessionClient {
    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::default()
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ScraperError> {
        let response = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|e| ScraperError::from_send(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for SessionClient {
    async fn fetch_text(&self, url: &str) -> Result<String, ScraperError> {
        tracing::debug!(url, "fetch text");
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| ScraperError::from_body(url, e))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScraperError> {
        tracing::debug!(url, "fetch bytes");
        let bytes = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| ScraperError::from_body(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// Builder for [SessionClient] with credentials, User-Agent, and timeout.
#[derive(Debug)]
pub struct SessionClientBuilder {
    credentials: Credentials,
    user_agent: Option<String>,
    timeout_secs: u64,
}

impl Default for SessionClientBuilder {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SessionClientBuilder {
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Per-request timeout in seconds, covering connect and body. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    pub fn build(self) -> Result<SessionClient, ScraperError> {
        let cookie = self.credentials.cookie_header();
        let cookie = HeaderValue::from_str(&cookie)
            .map_err(|e| ScraperError::InvalidCredentials {
                reason: e.to_string(),
            })?;
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie);

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| ScraperError::Network {
                url: String::new(),
                source: e,
            })?;
        Ok(SessionClient { inner })
    }
}

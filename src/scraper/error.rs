//! Shared error type for fetching and extraction.

use thiserror::Error;

/// Coarse classification, recorded as the `kind` field of failure log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or HTTP failure: connect, timeout, non-success status, body read.
    Transport,
    /// Expected structure absent from fetched markup, or an unusable link.
    Parse,
    /// Client could not be built from the given settings.
    Setup,
}

/// Errors from the fetcher and the content extractor.
#[derive(Debug, Error)]
pub enum ScraperError {
    // Transport
    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parsing
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Could not parse novel page {url}: {message}")]
    ParseNovelPage { url: String, message: String },

    #[error("Could not parse chapter {index} at {url}: {message}")]
    ParseChapter {
        index: u32,
        url: String,
        message: String,
    },

    #[error("Novel page {url} has no chapters (possibly deleted or access restricted).")]
    EmptyChapterList { url: String },

    // Setup
    #[error("Session credentials are not a valid cookie header: {reason}")]
    InvalidCredentials { reason: String },
}

impl ScraperError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScraperError::Network { .. }
            | ScraperError::Timeout { .. }
            | ScraperError::HttpStatus { .. }
            | ScraperError::BodyRead { .. } => ErrorKind::Transport,
            ScraperError::InvalidUrl { .. }
            | ScraperError::ParseNovelPage { .. }
            | ScraperError::ParseChapter { .. }
            | ScraperError::EmptyChapterList { .. } => ErrorKind::Parse,
            ScraperError::InvalidCredentials { .. } => ErrorKind::Setup,
        }
    }

    /// Classify a reqwest send error; timeouts get their own variant.
    pub(crate) fn from_send(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ScraperError::Timeout {
                url: url.to_string(),
            }
        } else {
            ScraperError::Network {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Classify a body read error; a timeout while streaming the body is still a timeout.
    pub(crate) fn from_body(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ScraperError::Timeout {
                url: url.to_string(),
            }
        } else {
            ScraperError::BodyRead {
                url: url.to_string(),
                source,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_variants_classify_as_transport() {
        let timeout = ScraperError::Timeout {
            url: "https://x/".into(),
        };
        let status = ScraperError::HttpStatus {
            status: 503,
            url: "https://x/".into(),
        };
        assert_eq!(timeout.kind(), ErrorKind::Transport);
        assert_eq!(status.kind(), ErrorKind::Transport);
    }

    #[test]
    fn parse_variants_classify_as_parse() {
        let chapter = ScraperError::ParseChapter {
            index: 3,
            url: "https://x/3.html".into(),
            message: "missing content block".into(),
        };
        let empty = ScraperError::EmptyChapterList {
            url: "https://x/".into(),
        };
        assert_eq!(chapter.kind(), ErrorKind::Parse);
        assert_eq!(empty.kind(), ErrorKind::Parse);
        assert_eq!(
            chapter.to_string(),
            "Could not parse chapter 3 at https://x/3.html: missing content block"
        );
    }
}

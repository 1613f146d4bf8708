//! Illustration resolver: stable file names, a process-wide download limiter, and the
//! per-novel download barrier.

use crate::pipeline::chapters::ChapterSet;
use crate::pipeline::policy::{settle, Operation};
use crate::scraper::{resolve_link, Fetcher};
use md5::{Digest, Md5};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

/// File name for an illustration: lowercase hex md5 of the URL plus `.jpg`.
pub fn illustration_filename(url: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(url.as_bytes());
    format!("{}.jpg", hex::encode(hasher.finalize()))
}

/// One illustration to download for a novel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllustrationSource {
    /// `src` exactly as written in the chapter markup; the key for rewriting.
    pub src: String,
    /// Absolute URL to download from.
    pub fetch_url: String,
    pub filename: String,
}

/// Union of the image URLs referenced by a novel's chapters, each listed once.
///
/// Ordered by first reference (lowest ordinal, then URL). Relative `src` values are resolved
/// against the page of the first chapter referencing them.
pub fn collect_illustrations(chapters: &ChapterSet) -> Vec<IllustrationSource> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for chapter in chapters.chapters() {
        for src in &chapter.image_urls {
            if !seen.insert(src.as_str()) {
                continue;
            }
            let fetch_url = resolve_link(&chapter.source_url, src).unwrap_or_else(|e| {
                tracing::debug!(src = %src, error = %e, "image URL not resolvable; using as written");
                src.clone()
            });
            sources.push(IllustrationSource {
                src: src.clone(),
                fetch_url,
                filename: illustration_filename(src),
            });
        }
    }
    sources
}

/// Resolved illustrations of one novel: `src` as written → local file name.
///
/// Only successfully downloaded images are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IllustrationMap {
    entries: BTreeMap<String, String>,
}

impl IllustrationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, src: impl Into<String>, filename: impl Into<String>) {
        self.entries.insert(src.into(), filename.into());
    }

    #[cfg(test)]
    pub fn get(&self, src: &str) -> Option<&str> {
        self.entries.get(src).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Distinct file names, sorted.
    pub fn filenames(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.values().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Process-wide cap on concurrent illustration downloads, shared by every novel.
#[derive(Debug, Clone)]
pub struct ImageLimiter {
    semaphore: Arc<Semaphore>,
    permits: usize,
}

impl ImageLimiter {
    pub const DEFAULT_PERMITS: usize = 400;

    pub fn new(permits: usize) -> Self {
        let permits = permits.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            permits,
        }
    }

    pub fn permits(&self) -> usize {
        self.permits
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).acquire_owned().await.ok()
    }
}

impl Default for ImageLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PERMITS)
    }
}

/// Download every illustration of one novel into `images_dir`, at most `limiter.permits()`
/// at a time across all novels sharing the limiter.
///
/// Waits for every download. A failed download or write is logged and left out of the
/// returned map, which leaves the chapter's reference pointing at the remote URL.
pub async fn download_illustrations(
    fetcher: Arc<dyn Fetcher>,
    limiter: &ImageLimiter,
    novel: &str,
    sources: Vec<IllustrationSource>,
    images_dir: &Path,
) -> IllustrationMap {
    let total = sources.len();
    tracing::info!(novel, illustrations = total, "downloading illustrations");
    tracing::debug!(
        novel,
        permits = limiter.permits(),
        available = limiter.available(),
        "image limiter"
    );
    let mut tasks = JoinSet::new();
    for source in sources {
        let fetcher = Arc::clone(&fetcher);
        let limiter = limiter.clone();
        let novel = novel.to_string();
        let path = images_dir.join(&source.filename);
        tasks.spawn(async move {
            download_one(fetcher.as_ref(), &limiter, &novel, source, path).await
        });
    }

    let mut map = IllustrationMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(source)) => map.insert(source.src, source.filename),
            Ok(None) => {}
            Err(e) => tracing::warn!(novel, error = %e, "illustration task did not complete"),
        }
    }
    tracing::info!(
        novel,
        resolved = map.len(),
        dropped = total - map.len(),
        "illustrations done"
    );
    map
}

async fn download_one(
    fetcher: &dyn Fetcher,
    limiter: &ImageLimiter,
    novel: &str,
    source: IllustrationSource,
    path: PathBuf,
) -> Option<IllustrationSource> {
    let _permit = limiter.acquire().await?;
    tracing::debug!(novel, url = %source.fetch_url, file = %source.filename, "download illustration");
    let fetched = fetcher.fetch_bytes(&source.fetch_url).await;
    let bytes = settle(Operation::IllustrationFetch, novel, fetched).ok()??;
    let written = tokio::fs::write(&path, bytes).await;
    settle(Operation::IllustrationWrite, novel, written).ok()??;
    tracing::info!(novel, url = %source.fetch_url, file = %source.filename, "illustration saved");
    Some(source)
}

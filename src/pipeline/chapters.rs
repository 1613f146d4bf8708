//! Chapter pipeline: fetch every chapter of one novel concurrently and collect the results
//! by ordinal behind a full barrier.

use crate::model::Chapter;
use crate::scraper::{esjzone, Fetcher, ScraperError};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

/// Violations of the one-write-per-ordinal rule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("chapter ordinal {ordinal} is out of range (chapter count {len})")]
    OutOfRange { ordinal: u32, len: usize },

    #[error("chapter ordinal {ordinal} was written twice")]
    AlreadyFilled { ordinal: u32 },

    #[error("chapter ordinal {ordinal} was never written")]
    Missing { ordinal: u32 },
}

/// Errors from [fetch_chapters]. Any of them aborts the owning novel.
#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("chapter {ordinal}: {source}")]
    Fetch {
        ordinal: u32,
        #[source]
        source: ScraperError,
    },

    #[error("chapter task failed: {0}")]
    Join(String),

    #[error(transparent)]
    Slot(#[from] SlotError),
}

/// Write-once storage for a novel's chapters, one slot per ordinal.
#[derive(Debug)]
pub struct ChapterSlots {
    slots: Vec<Option<Chapter>>,
}

impl ChapterSlots {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    /// Store `chapter` at `chapter.index`. Each ordinal accepts exactly one write.
    pub fn fill(&mut self, chapter: Chapter) -> Result<(), SlotError> {
        let ordinal = chapter.index;
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(ordinal as usize)
            .ok_or(SlotError::OutOfRange { ordinal, len })?;
        if slot.is_some() {
            return Err(SlotError::AlreadyFilled { ordinal });
        }
        *slot = Some(chapter);
        Ok(())
    }

    /// Close the barrier. Fails with the first unwritten ordinal.
    pub fn complete(self) -> Result<ChapterSet, SlotError> {
        let chapters = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.ok_or(SlotError::Missing { ordinal: i as u32 }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ChapterSet { chapters })
    }
}

/// Every chapter of one novel, in ordinal order. `chapters()[i].index == i` always holds.
///
/// This is the novel-scoped chapter title index consumed by the TOC and manifest builders.
#[derive(Debug, Clone, Default)]
pub struct ChapterSet {
    chapters: Vec<Chapter>,
}

impl ChapterSet {
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Recorded title of the chapter at `ordinal`.
    pub fn title(&self, ordinal: u32) -> Option<&str> {
        self.chapters
            .get(ordinal as usize)
            .map(|c| c.title.as_str())
    }
}

/// Fetch and extract every chapter in `links` concurrently.
///
/// The ordinal of each chapter is its position in `links`, bound before its task is spawned,
/// so completion order never affects where a result lands. All tasks are awaited before
/// returning. On failure the error of the lowest failing ordinal is returned.
pub async fn fetch_chapters(
    fetcher: Arc<dyn Fetcher>,
    novel: &str,
    links: &[String],
) -> Result<ChapterSet, ChapterError> {
    tracing::info!(novel, chapters = links.len(), "fetching chapters");
    let mut tasks = JoinSet::new();
    for (ordinal, url) in links.iter().enumerate() {
        let ordinal = ordinal as u32;
        let fetcher = Arc::clone(&fetcher);
        let url = url.clone();
        let novel = novel.to_string();
        tasks.spawn(async move {
            let result = fetch_chapter(fetcher.as_ref(), &novel, ordinal, &url).await;
            (ordinal, result)
        });
    }

    let mut slots = ChapterSlots::new(links.len());
    let mut failures: Vec<(u32, ScraperError)> = Vec::new();
    let mut join_failure: Option<String> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(chapter))) => slots.fill(chapter)?,
            Ok((ordinal, Err(e))) => {
                tracing::error!(
                    novel,
                    ordinal,
                    kind = ?e.kind(),
                    error = %e,
                    "chapter failed"
                );
                failures.push((ordinal, e));
            }
            Err(e) => {
                tracing::error!(novel, error = %e, "chapter task did not complete");
                join_failure.get_or_insert_with(|| e.to_string());
            }
        }
    }

    if let Some((ordinal, source)) = failures.into_iter().min_by_key(|(o, _)| *o) {
        return Err(ChapterError::Fetch { ordinal, source });
    }
    if let Some(message) = join_failure {
        return Err(ChapterError::Join(message));
    }
    let set = slots.complete()?;
    tracing::info!(novel, chapters = set.len(), "all chapters fetched");
    Ok(set)
}

async fn fetch_chapter(
    fetcher: &dyn Fetcher,
    novel: &str,
    ordinal: u32,
    url: &str,
) -> Result<Chapter, ScraperError> {
    tracing::debug!(novel, ordinal, url, "fetch chapter");
    let html = fetcher.fetch_text(url).await?;
    let chapter = esjzone::extract_chapter(&html, ordinal, url)?;
    tracing::info!(
        novel,
        ordinal,
        title = %chapter.title,
        images = chapter.image_urls.len(),
        "chapter fetched"
    );
    Ok(chapter)
}

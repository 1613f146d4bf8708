//! One novel's run: listing, scaffolding, cover, chapters, illustrations, assembly, archive.

use crate::epub::{self, EpubError, NovelLayout};
use crate::model::NovelMeta;
use crate::pipeline::chapters::{fetch_chapters, ChapterError};
use crate::pipeline::illustrations::{collect_illustrations, download_illustrations};
use crate::pipeline::policy::{settle, Operation};
use crate::pipeline::PipelineContext;
use crate::scraper::{esjzone, ScraperError};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Progress of one novel. A failure keeps the stage it happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Init,
    Scaffolding,
    CoverFetch,
    ChapterFetch,
    IllustrationFetch,
    Assemble,
    Archive,
    Done,
}

impl Stage {
    /// Stages announced at INFO; the rest log their own progress or are logged at DEBUG.
    fn is_milestone(self) -> bool {
        matches!(self, Stage::Scaffolding | Stage::Assemble | Stage::Archive)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::Scaffolding => "scaffolding",
            Stage::CoverFetch => "cover fetch",
            Stage::ChapterFetch => "chapter fetch",
            Stage::IllustrationFetch => "illustration fetch",
            Stage::Assemble => "assemble",
            Stage::Archive => "archive",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum NovelFailure {
    #[error(transparent)]
    Scraper(#[from] ScraperError),

    #[error(transparent)]
    Chapters(#[from] ChapterError),

    #[error(transparent)]
    Epub(#[from] EpubError),

    #[error("novel task did not complete: {0}")]
    Task(String),
}

/// A novel that did not produce an EPUB.
#[derive(Debug, Error)]
#[error("{url}: failed during {stage}: {source}")]
pub struct NovelError {
    pub url: String,
    /// Known once the listing page has been parsed.
    pub title: Option<String>,
    pub stage: Stage,
    #[source]
    pub source: NovelFailure,
}

/// Run one novel to completion.
///
/// Returns the path of the written `.epub`. Cover and illustration failures are absorbed
/// per the policy table; every other failure ends the novel with the stage it reached.
pub async fn build_novel(ctx: &PipelineContext, url: &str) -> Result<PathBuf, NovelError> {
    let mut run = NovelRun {
        title: None,
        stage: Stage::Init,
    };
    match run.execute(ctx, url).await {
        Ok(path) => Ok(path),
        Err(source) => {
            let err = NovelError {
                url: url.to_string(),
                title: run.title,
                stage: run.stage,
                source,
            };
            tracing::error!(url, stage = %err.stage, error = %err.source, "novel failed");
            Err(err)
        }
    }
}

struct NovelRun {
    title: Option<String>,
    stage: Stage,
}

impl NovelRun {
    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        let novel = self.title.as_deref().unwrap_or("");
        if stage.is_milestone() {
            tracing::info!(novel, stage = %stage, "entering stage");
        } else {
            tracing::debug!(novel, stage = %stage, "entering stage");
        }
    }

    async fn execute(
        &mut self,
        ctx: &PipelineContext,
        url: &str,
    ) -> Result<PathBuf, NovelFailure> {
        tracing::info!(url, "fetching listing");
        let html = ctx.fetcher.fetch_text(url).await?;
        let meta = esjzone::extract_novel_meta(&html, url)?;
        let title = meta.title.clone();
        self.title = Some(title.clone());
        tracing::info!(
            novel = %title,
            author = %meta.author,
            chapters = meta.chapter_links.len(),
            "listing parsed"
        );

        self.enter(Stage::Scaffolding);
        let stem = meta.file_stem();
        ctx.claim_title(&stem).await?;
        let layout = NovelLayout::new(&ctx.root_dir, &stem);
        epub::scaffold(&layout).await?;

        self.enter(Stage::CoverFetch);
        fetch_cover(ctx, &layout, &meta).await?;

        self.enter(Stage::ChapterFetch);
        let chapters = fetch_chapters(ctx.fetcher.clone(), &title, &meta.chapter_links).await?;

        self.enter(Stage::IllustrationFetch);
        let sources = collect_illustrations(&chapters);
        let illustrations = download_illustrations(
            ctx.fetcher.clone(),
            &ctx.limiter,
            &title,
            sources,
            &layout.images_dir(),
        )
        .await;

        self.enter(Stage::Assemble);
        epub::assemble(&layout, &meta, &chapters, &illustrations, &ctx.resources).await?;

        self.enter(Stage::Archive);
        let path = epub::package(layout.root(), &ctx.output_dir, &stem).await?;

        self.enter(Stage::Done);
        tracing::info!(novel = %title, file = %path.display(), "novel packaged");
        Ok(path)
    }
}

/// Write the bundled cover, then replace it with the novel's own cover when that downloads.
async fn fetch_cover(
    ctx: &PipelineContext,
    layout: &NovelLayout,
    meta: &NovelMeta,
) -> Result<(), NovelFailure> {
    epub::write_cover(layout, &ctx.resources.default_cover).await?;
    let Some(cover_url) = meta.cover_url.as_deref() else {
        tracing::info!(novel = %meta.title, "no cover on listing; using default");
        return Ok(());
    };
    let fetched = ctx.fetcher.fetch_bytes(cover_url).await;
    let Some(bytes) = settle(Operation::CoverFetch, &meta.title, fetched)? else {
        return Ok(());
    };
    let Some(bytes) = settle(Operation::CoverParse, &meta.title, check_cover(cover_url, bytes))?
    else {
        return Ok(());
    };
    epub::write_cover(layout, &bytes).await?;
    tracing::info!(novel = %meta.title, url = cover_url, "cover saved");
    Ok(())
}

fn check_cover(url: &str, bytes: Vec<u8>) -> Result<Vec<u8>, ScraperError> {
    if bytes.is_empty() {
        return Err(ScraperError::ParseNovelPage {
            url: url.to_string(),
            message: "cover image is empty".to_string(),
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::Resources;
    use crate::pipeline::illustrations::ImageLimiter;
    use crate::pipeline::testing::{chapter_page, listing_page, FakeSite};
    use std::path::Path;

    const LISTING: &str = "https://www.esjzone.cc/detail/100.html";

    fn context(site: &FakeSite, dir: &Path) -> PipelineContext {
        let out = dir.join("out");
        std::fs::create_dir_all(&out).unwrap();
        PipelineContext::new(
            site.shared(),
            ImageLimiter::new(8),
            Resources::default(),
            dir.join("raw"),
            out,
        )
    }

    fn links(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("https://www.esjzone.cc/forum/100/{}.html", i))
            .collect()
    }

    #[tokio::test]
    async fn unreachable_cover_falls_back_to_default() -> Result<(), NovelError> {
        let site = FakeSite::new();
        let tmp = tempfile::tempdir().unwrap();
        let links = links(1);
        site.page(
            LISTING,
            &listing_page("Book", "Me", Some("https://img.test/cover.jpg"), &links),
        );
        site.page(&links[0], &chapter_page("One", ""));
        let ctx = context(&site, tmp.path());

        let path = build_novel(&ctx, LISTING).await?;
        assert_eq!(path, tmp.path().join("out/Book.epub"));
        let cover = std::fs::read(tmp.path().join("raw/Book/OEBPS/Images/cover.jpg")).unwrap();
        assert_eq!(cover, Resources::default().default_cover);
        Ok(())
    }

    #[tokio::test]
    async fn listing_without_cover_packages_default_cover() -> Result<(), NovelError> {
        let site = FakeSite::new();
        let tmp = tempfile::tempdir().unwrap();
        let links = links(1);
        site.page(LISTING, &listing_page("Book", "Me", None, &links));
        site.page(&links[0], &chapter_page("One", ""));
        let ctx = context(&site, tmp.path());

        let path = build_novel(&ctx, LISTING).await?;
        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        let mut cover = Vec::new();
        std::io::Read::read_to_end(
            &mut archive.by_name("OEBPS/Images/cover.jpg").unwrap(),
            &mut cover,
        )
        .unwrap();
        assert_eq!(cover, Resources::default().default_cover);
        Ok(())
    }

    #[tokio::test]
    async fn downloaded_cover_replaces_default() -> Result<(), NovelError> {
        let site = FakeSite::new();
        let tmp = tempfile::tempdir().unwrap();
        let links = links(1);
        site.page(
            LISTING,
            &listing_page("Book", "Me", Some("https://img.test/cover.jpg"), &links),
        );
        site.bytes("https://img.test/cover.jpg", b"real-cover");
        site.page(&links[0], &chapter_page("One", ""));
        let ctx = context(&site, tmp.path());

        build_novel(&ctx, LISTING).await?;
        let cover = std::fs::read(tmp.path().join("raw/Book/OEBPS/Images/cover.jpg")).unwrap();
        assert_eq!(cover, b"real-cover");
        Ok(())
    }

    #[test]
    fn packaging_stages_are_announced() {
        assert!(Stage::Assemble.is_milestone());
        assert!(Stage::Archive.is_milestone());
        assert!(Stage::Scaffolding.is_milestone());
        assert!(!Stage::ChapterFetch.is_milestone());
        assert!(!Stage::Done.is_milestone());
    }

    #[tokio::test]
    async fn listing_failure_reports_init_stage() {
        let site = FakeSite::new();
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&site, tmp.path());

        let err = build_novel(&ctx, LISTING).await.unwrap_err();
        assert_eq!(err.stage, Stage::Init);
        assert_eq!(err.title, None);
        assert!(matches!(
            err.source,
            NovelFailure::Scraper(ScraperError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn chapter_failure_leaves_no_epub() {
        let site = FakeSite::new();
        let tmp = tempfile::tempdir().unwrap();
        let links = links(2);
        site.page(LISTING, &listing_page("Book", "Me", None, &links));
        site.page(&links[0], &chapter_page("One", ""));
        let ctx = context(&site, tmp.path());

        let err = build_novel(&ctx, LISTING).await.unwrap_err();
        assert_eq!(err.stage, Stage::ChapterFetch);
        assert_eq!(err.title.as_deref(), Some("Book"));
        assert!(matches!(
            err.source,
            NovelFailure::Chapters(ChapterError::Fetch { ordinal: 1, .. })
        ));
        assert!(!tmp.path().join("out/Book.epub").exists());
        assert!(!tmp.path().join("raw/Book.zip").exists());
    }

    #[tokio::test]
    async fn second_novel_with_same_stem_fails_at_scaffolding() {
        let site = FakeSite::new();
        let tmp = tempfile::tempdir().unwrap();
        let other = "https://www.esjzone.cc/detail/200.html";
        let links = links(1);
        site.page(LISTING, &listing_page("Same: Title", "Me", None, &links));
        site.page(other, &listing_page("Same? Title", "Me", None, &links));
        site.page(&links[0], &chapter_page("One", ""));
        let ctx = context(&site, tmp.path());

        build_novel(&ctx, LISTING).await.unwrap();
        let err = build_novel(&ctx, other).await.unwrap_err();
        assert_eq!(err.stage, Stage::Scaffolding);
        assert!(matches!(
            err.source,
            NovelFailure::Epub(EpubError::TitleInUse { .. })
        ));
    }
}

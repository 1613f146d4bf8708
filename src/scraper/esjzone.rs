//! ESJ Zone extractor. Pure functions from fetched markup to [NovelMeta] and [Chapter].
//!
//! Listing page: title `h2.p-t-10.text-normal`, author in `ul.book-detail`, cover link in
//! `div.product-gallery`, chapter links under `#chapterList`. Chapter page: title `h2` in the
//! main column, content block `div.forum-content.mt-3`.

use crate::model::{Chapter, NovelMeta};
use crate::scraper::{resolve_link, ScraperError};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;

const UNKNOWN_AUTHOR: &str = "Unknown";

/// Parse a CSS selector or return a parse error (avoids panics from Selector::parse).
fn parse_selector(sel: &str) -> Result<Selector, ScraperError> {
    Selector::parse(sel).map_err(|e| ScraperError::ParseNovelPage {
        url: String::new(),
        message: format!("invalid selector {:?}: {}", sel, e),
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Extract title, author, optional cover link, and the ordered chapter links from a listing page.
///
/// A missing cover block yields `cover_url: None`; a missing author yields `"Unknown"`.
/// A missing title or an empty chapter list is a parse error.
pub fn extract_novel_meta(html: &str, page_url: &str) -> Result<NovelMeta, ScraperError> {
    let doc = Html::parse_document(html);
    let title_sel = parse_selector("h2.p-t-10.text-normal")?;
    let author_sel = parse_selector("ul.list-unstyled.mb-2.book-detail a")?;
    let cover_sel = parse_selector("div.product-gallery.text-center.mb-3 a[href]")?;
    let chapter_sel = parse_selector("#chapterList a[href]")?;

    let title = doc
        .select(&title_sel)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ScraperError::ParseNovelPage {
            url: page_url.to_string(),
            message: "missing title (selector or structure may have changed)".to_string(),
        })?;

    let author = match doc
        .select(&author_sel)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
    {
        Some(a) => a,
        None => {
            tracing::warn!(novel = %title, url = page_url, "author not found on novel page");
            UNKNOWN_AUTHOR.to_string()
        }
    };

    let cover_url = match doc
        .select(&cover_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(href) => Some(resolve_link(page_url, href)?),
        None => None,
    };

    let chapter_links = doc
        .select(&chapter_sel)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(|href| resolve_link(page_url, href))
        .collect::<Result<Vec<_>, _>>()?;
    if chapter_links.is_empty() {
        return Err(ScraperError::EmptyChapterList {
            url: page_url.to_string(),
        });
    }

    Ok(NovelMeta {
        source_url: page_url.to_string(),
        title,
        author,
        cover_url,
        chapter_links,
    })
}

/// Extract title, content block markup, and referenced image URLs from a chapter page.
///
/// `index` is the chapter ordinal bound by the caller; it is carried into the result and
/// into error messages. Both the title and the content block are required.
pub fn extract_chapter(html: &str, index: u32, page_url: &str) -> Result<Chapter, ScraperError> {
    let doc = Html::parse_document(html);
    let title_sel = parse_selector("div.col-xl-9.col-lg-8.p-r-30 h2")?;
    let content_sel = parse_selector("div.forum-content.mt-3")?;
    let img_sel = parse_selector("img[src]")?;

    let missing = |what: &str| ScraperError::ParseChapter {
        index,
        url: page_url.to_string(),
        message: format!("missing {}", what),
    };

    let title = doc
        .select(&title_sel)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("chapter title"))?;

    let content = doc
        .select(&content_sel)
        .next()
        .ok_or_else(|| missing("content block"))?;

    let image_urls: BTreeSet<String> = content
        .select(&img_sel)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| !src.trim().is_empty())
        .map(String::from)
        .collect();

    Ok(Chapter {
        index,
        title,
        body: content.html(),
        image_urls,
        source_url: page_url.to_string(),
    })
}

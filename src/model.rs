//! Data model shared by the extractor, the pipelines, and the EPUB assembler.
//!
//! A novel is identified by its listing URL; a chapter by its 0-based ordinal in the
//! listing's chapter list. Both are produced per run and discarded after packaging.

use std::collections::BTreeSet;

/// Metadata extracted from a novel's listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NovelMeta {
    /// Listing URL the metadata was read from.
    pub source_url: String,
    /// Title as displayed on the site. Use [NovelMeta::file_stem] for paths.
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
    /// Absolute chapter URLs in listing order. Position is the chapter ordinal.
    pub chapter_links: Vec<String>,
}

impl NovelMeta {
    /// Filesystem-safe name used for the staging directory and the `.epub` file.
    pub fn file_stem(&self) -> String {
        sanitize_file_stem(&self.title)
    }
}

/// One chapter of a novel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 0-based ordinal from the chapter list. Names the chapter file (`<index>.xhtml`).
    pub index: u32,
    pub title: String,
    /// Raw markup of the chapter content block.
    pub body: String,
    /// `src` values of every `<img>` in `body`, exactly as written.
    pub image_urls: BTreeSet<String>,
    /// Page the chapter was fetched from; base for relative image URLs.
    pub source_url: String,
}

/// Replace characters that are unsafe in file names on common platforms.
///
/// Non-ASCII text (e.g. CJK titles) is kept as is. Leading/trailing whitespace and
/// dots are trimmed; an empty result becomes `novel`.
pub fn sanitize_file_stem(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if trimmed.is_empty() {
        "novel".to_string()
    } else {
        trimmed.to_string()
    }
}

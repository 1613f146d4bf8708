//! OPF 2.0 package document (`OEBPS/content.opf`).

use crate::epub::xhtml::{COVER_FILE, TITLE_PAGE_FILE};
use crate::epub::EpubError;
use crate::model::NovelMeta;
use crate::pipeline::chapters::ChapterSet;
use serde::Serialize;

const XHTML_MEDIA: &str = "application/xhtml+xml";
const JPEG_MEDIA: &str = "image/jpeg";
const NCX_MEDIA: &str = "application/x-dtbncx+xml";
const BOOK_ID: &str = "bookid";
pub(crate) const LANGUAGE: &str = "zh-CN";

#[derive(Debug, Serialize)]
#[serde(rename = "package")]
pub struct PackageDocument {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@version")]
    version: &'static str,
    #[serde(rename = "@unique-identifier")]
    unique_identifier: &'static str,
    metadata: Metadata,
    manifest: Manifest,
    spine: Spine,
    guide: Guide,
}

#[derive(Debug, Serialize)]
struct Metadata {
    #[serde(rename = "@xmlns:dc")]
    xmlns_dc: &'static str,
    #[serde(rename = "@xmlns:opf")]
    xmlns_opf: &'static str,
    #[serde(rename = "dc:identifier")]
    identifier: Identifier,
    #[serde(rename = "dc:title")]
    title: String,
    #[serde(rename = "dc:creator")]
    creator: String,
    #[serde(rename = "dc:language")]
    language: &'static str,
    meta: Meta,
}

#[derive(Debug, Serialize)]
struct Identifier {
    #[serde(rename = "@id")]
    id: &'static str,
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Debug, Serialize)]
struct Meta {
    #[serde(rename = "@name")]
    name: &'static str,
    #[serde(rename = "@content")]
    content: &'static str,
}

#[derive(Debug, Serialize)]
struct Manifest {
    item: Vec<Item>,
}

#[derive(Debug, Serialize)]
struct Item {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@media-type")]
    media_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Spine {
    #[serde(rename = "@toc")]
    toc: &'static str,
    itemref: Vec<ItemRef>,
}

#[derive(Debug, Serialize)]
struct ItemRef {
    #[serde(rename = "@idref")]
    idref: String,
}

#[derive(Debug, Serialize)]
struct Guide {
    reference: Reference,
}

#[derive(Debug, Serialize)]
struct Reference {
    #[serde(rename = "@type")]
    kind: &'static str,
    #[serde(rename = "@title")]
    title: &'static str,
    #[serde(rename = "@href")]
    href: String,
}

fn item(id: impl Into<String>, href: impl Into<String>, media_type: &'static str) -> Item {
    Item {
        id: id.into(),
        href: href.into(),
        media_type,
    }
}

fn chapter_id(ordinal: u32) -> String {
    format!("chapter-{}", ordinal)
}

impl PackageDocument {
    /// Build the package for `meta`. `illustrations` are image file names under `Images/`
    /// other than the cover; they are listed sorted.
    pub fn new(meta: &NovelMeta, chapters: &ChapterSet, illustrations: &[&str]) -> Self {
        let mut items = vec![item(
            "titlepage",
            format!("Text/{}", TITLE_PAGE_FILE),
            XHTML_MEDIA,
        )];
        let mut refs = vec![ItemRef {
            idref: "titlepage".to_string(),
        }];
        for chapter in chapters.chapters() {
            items.push(item(
                chapter_id(chapter.index),
                format!("Text/{}.xhtml", chapter.index),
                XHTML_MEDIA,
            ));
            refs.push(ItemRef {
                idref: chapter_id(chapter.index),
            });
        }
        items.push(item("ncx", "toc.ncx", NCX_MEDIA));
        items.push(item(
            "cover-image",
            format!("Images/{}", COVER_FILE),
            JPEG_MEDIA,
        ));
        let mut illustrations = illustrations.to_vec();
        illustrations.sort_unstable();
        illustrations.dedup();
        for (i, name) in illustrations.iter().enumerate() {
            items.push(item(
                format!("image-{}", i + 1),
                format!("Images/{}", name),
                JPEG_MEDIA,
            ));
        }

        Self {
            xmlns: "http://www.idpf.org/2007/opf",
            version: "2.0",
            unique_identifier: BOOK_ID,
            metadata: Metadata {
                xmlns_dc: "http://purl.org/dc/elements/1.1/",
                xmlns_opf: "http://www.idpf.org/2007/opf",
                identifier: Identifier {
                    id: BOOK_ID,
                    value: meta.source_url.clone(),
                },
                title: meta.title.clone(),
                creator: meta.author.clone(),
                language: LANGUAGE,
                meta: Meta {
                    name: "cover",
                    content: "cover-image",
                },
            },
            manifest: Manifest { item: items },
            spine: Spine {
                toc: "ncx",
                itemref: refs,
            },
            guide: Guide {
                reference: Reference {
                    kind: "cover",
                    title: "Cover",
                    href: format!("Text/{}", TITLE_PAGE_FILE),
                },
            },
        }
    }

    pub fn manifest_len(&self) -> usize {
        self.manifest.item.len()
    }

    pub fn spine_len(&self) -> usize {
        self.spine.itemref.len()
    }

    /// Manifest hrefs in document order.
    #[cfg(test)]
    pub fn hrefs(&self) -> impl Iterator<Item = &str> {
        self.manifest.item.iter().map(|i| i.href.as_str())
    }

    pub fn to_xml(&self) -> Result<String, EpubError> {
        let body = quick_xml::se::to_string(self).map_err(|e| EpubError::Xml {
            document: "content.opf",
            message: e.to_string(),
        })?;
        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}\n",
            body
        ))
    }
}

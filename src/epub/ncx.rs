//! NCX navigation document (`OEBPS/toc.ncx`).

use crate::epub::xhtml::TITLE_PAGE_FILE;
use crate::epub::EpubError;
use crate::model::NovelMeta;
use crate::pipeline::chapters::ChapterSet;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename = "ncx")]
pub struct Ncx {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@version")]
    version: &'static str,
    head: Head,
    #[serde(rename = "docTitle")]
    doc_title: Text,
    #[serde(rename = "docAuthor")]
    doc_author: Text,
    #[serde(rename = "navMap")]
    nav_map: NavMap,
}

#[derive(Debug, Serialize)]
struct Head {
    meta: Vec<Meta>,
}

#[derive(Debug, Serialize)]
struct Meta {
    #[serde(rename = "@name")]
    name: &'static str,
    #[serde(rename = "@content")]
    content: String,
}

#[derive(Debug, Serialize)]
struct Text {
    text: String,
}

#[derive(Debug, Serialize)]
struct NavMap {
    #[serde(rename = "navPoint")]
    nav_point: Vec<NavPoint>,
}

#[derive(Debug, Serialize)]
struct NavPoint {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@playOrder")]
    play_order: u32,
    #[serde(rename = "navLabel")]
    nav_label: Text,
    content: Content,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "@src")]
    src: String,
}

fn nav_point(id: String, play_order: u32, label: &str, src: String) -> NavPoint {
    NavPoint {
        id,
        play_order,
        nav_label: Text {
            text: label.to_string(),
        },
        content: Content { src },
    }
}

impl Ncx {
    /// Cover entry first (playOrder 0), then `ep<n>` for each chapter, n starting at 1.
    pub fn new(meta: &NovelMeta, chapters: &ChapterSet) -> Self {
        let mut points = vec![nav_point(
            "cover".to_string(),
            0,
            "封面",
            format!("Text/{}", TITLE_PAGE_FILE),
        )];
        for ordinal in 0..chapters.len() as u32 {
            let n = ordinal + 1;
            points.push(nav_point(
                format!("ep{}", n),
                n,
                chapters.title(ordinal).unwrap_or_default(),
                format!("Text/{}.xhtml", ordinal),
            ));
        }
        Self {
            xmlns: "http://www.daisy.org/z3986/2005/ncx/",
            version: "2005-1",
            head: Head {
                meta: vec![
                    Meta {
                        name: "dtb:uid",
                        content: meta.source_url.clone(),
                    },
                    Meta {
                        name: "dtb:depth",
                        content: "1".to_string(),
                    },
                ],
            },
            doc_title: Text {
                text: meta.title.clone(),
            },
            doc_author: Text {
                text: meta.author.clone(),
            },
            nav_map: NavMap { nav_point: points },
        }
    }

    pub fn nav_len(&self) -> usize {
        self.nav_map.nav_point.len()
    }

    pub fn to_xml(&self) -> Result<String, EpubError> {
        let body = quick_xml::se::to_string(self).map_err(|e| EpubError::Xml {
            document: "toc.ncx",
            message: e.to_string(),
        })?;
        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE ncx PUBLIC \"-//NISO//DTD ncx 2005-1//EN\" \"http://www.daisy.org/z3986/2005/ncx-2005-1.dtd\">\n{}\n",
            body
        ))
    }
}

//! EPUB 2 assembler. Lays out a novel's staging directory, writes the chapter documents,
//! package document and NCX, and packages the result (see [archive]).

pub mod archive;
pub mod ncx;
pub mod opf;
pub mod xhtml;

use crate::model::NovelMeta;
use crate::pipeline::chapters::ChapterSet;
use crate::pipeline::illustrations::IllustrationMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use archive::package;
pub use ncx::Ncx;
pub use opf::PackageDocument;
pub use xhtml::rewrite_illustration_refs;

const CONTAINER_XML: &[u8] = include_bytes!("../../resources/container.xml");
const MIMETYPE: &[u8] = include_bytes!("../../resources/mimetype");
const DEFAULT_COVER: &[u8] = include_bytes!("../../resources/default_cover.jpg");

/// Packaging errors. Every one of them is fatal to the owning novel.
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    #[error("title \"{stem}\" is already being packaged in this run")]
    TitleInUse { stem: String },

    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path { path: PathBuf },

    #[error("{} is not inside staging directory {}", path.display(), root.display())]
    OutsideStaging { path: PathBuf, root: PathBuf },

    #[error("failed to write EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to serialize {document}: {message}")]
    Xml {
        document: &'static str,
        message: String,
    },

    #[error("packaging task failed: {0}")]
    Join(String),
}

impl From<std::io::Error> for EpubError {
    fn from(e: std::io::Error) -> Self {
        EpubError::Zip(zip::result::ZipError::Io(e))
    }
}

impl EpubError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        EpubError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

async fn write_file(path: &Path, bytes: impl AsRef<[u8]>) -> Result<(), EpubError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| EpubError::io(path, e))
}

/// Static files copied into every package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    pub container_xml: Vec<u8>,
    pub mimetype: Vec<u8>,
    pub default_cover: Vec<u8>,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            container_xml: CONTAINER_XML.to_vec(),
            mimetype: MIMETYPE.to_vec(),
            default_cover: DEFAULT_COVER.to_vec(),
        }
    }
}

impl Resources {
    /// Read `container.xml`, `mimetype` and `default_cover.jpg` from `dir`. A missing file
    /// falls back to the compiled-in copy; any other read error is returned.
    pub async fn load(dir: &Path) -> Result<Self, EpubError> {
        let builtin = Self::default();
        Ok(Self {
            container_xml: read_or(dir, "container.xml", builtin.container_xml).await?,
            mimetype: read_or(dir, "mimetype", builtin.mimetype).await?,
            default_cover: read_or(dir, "default_cover.jpg", builtin.default_cover).await?,
        })
    }
}

async fn read_or(dir: &Path, name: &str, fallback: Vec<u8>) -> Result<Vec<u8>, EpubError> {
    let path = dir.join(name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(file = %path.display(), "resource not found; using built-in copy");
            Ok(fallback)
        }
        Err(e) => Err(EpubError::io(&path, e)),
    }
}

/// Paths inside one novel's staging directory `<root>/<stem>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NovelLayout {
    root: PathBuf,
}

impl NovelLayout {
    pub fn new(staging_root: &Path, stem: &str) -> Self {
        Self {
            root: staging_root.join(stem),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta_inf(&self) -> PathBuf {
        self.root.join("META-INF")
    }

    pub fn oebps(&self) -> PathBuf {
        self.root.join("OEBPS")
    }

    pub fn text_dir(&self) -> PathBuf {
        self.oebps().join("Text")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.oebps().join("Images")
    }

    pub fn cover_path(&self) -> PathBuf {
        self.images_dir().join(xhtml::COVER_FILE)
    }

    pub fn chapter_path(&self, ordinal: u32) -> PathBuf {
        self.text_dir().join(format!("{}.xhtml", ordinal))
    }

    fn directories(&self) -> [PathBuf; 5] {
        let oebps = self.oebps();
        [
            self.meta_inf(),
            oebps.join("Text"),
            oebps.join("Images"),
            oebps.join("FONTS"),
            oebps.join("STYLES"),
        ]
    }
}

/// Replace any previous staging directory with an empty layout.
pub async fn scaffold(layout: &NovelLayout) -> Result<(), EpubError> {
    match tokio::fs::remove_dir_all(layout.root()).await {
        Ok(()) => tracing::debug!(dir = %layout.root().display(), "removed old staging directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(EpubError::io(layout.root(), e)),
    }
    for dir in layout.directories() {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| EpubError::io(&dir, e))?;
    }
    Ok(())
}

/// Write `bytes` as the cover image, replacing any previous one.
pub async fn write_cover(layout: &NovelLayout, bytes: &[u8]) -> Result<(), EpubError> {
    write_file(&layout.cover_path(), bytes).await
}

/// Sizes of the written package documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assembly {
    pub manifest_items: usize,
    pub spine_items: usize,
    pub nav_points: usize,
}

/// Write everything the archive needs into the staging directory.
///
/// Chapter bodies get their resolved illustration URLs rewritten to local paths first. The
/// cover file is expected to exist already.
pub async fn assemble(
    layout: &NovelLayout,
    meta: &NovelMeta,
    chapters: &ChapterSet,
    illustrations: &IllustrationMap,
    resources: &Resources,
) -> Result<Assembly, EpubError> {
    for chapter in chapters.chapters() {
        let body = rewrite_illustration_refs(&chapter.body, illustrations);
        let doc = xhtml::chapter_document(&chapter.title, &body);
        write_file(&layout.chapter_path(chapter.index), doc).await?;
    }
    write_file(
        &layout.text_dir().join(xhtml::TITLE_PAGE_FILE),
        xhtml::title_page(),
    )
    .await?;

    let package = PackageDocument::new(meta, chapters, &illustrations.filenames());
    write_file(&layout.oebps().join("content.opf"), package.to_xml()?).await?;
    let ncx = Ncx::new(meta, chapters);
    write_file(&layout.oebps().join("toc.ncx"), ncx.to_xml()?).await?;

    write_file(
        &layout.meta_inf().join("container.xml"),
        &resources.container_xml,
    )
    .await?;
    write_file(&layout.root().join("mimetype"), &resources.mimetype).await?;

    let assembly = Assembly {
        manifest_items: package.manifest_len(),
        spine_items: package.spine_len(),
        nav_points: ncx.nav_len(),
    };
    tracing::info!(
        novel = %meta.title,
        manifest = assembly.manifest_items,
        spine = assembly.spine_items,
        nav = assembly.nav_points,
        "package documents written"
    );
    Ok(assembly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Chapter;
    use crate::pipeline::chapters::ChapterSlots;
    use std::collections::BTreeSet;

    fn meta() -> NovelMeta {
        NovelMeta {
            source_url: "https://www.esjzone.cc/detail/3.html".to_string(),
            title: "Book".to_string(),
            author: "Someone".to_string(),
            cover_url: None,
            chapter_links: vec![],
        }
    }

    fn chapters() -> ChapterSet {
        let mut slots = ChapterSlots::new(2);
        slots
            .fill(Chapter {
                index: 1,
                title: "Two".to_string(),
                body: r#"<div><img src="https://img.test/missing.jpg"/></div>"#.to_string(),
                image_urls: BTreeSet::from(["https://img.test/missing.jpg".to_string()]),
                source_url: "https://site.test/1.html".to_string(),
            })
            .unwrap();
        slots
            .fill(Chapter {
                index: 0,
                title: "One".to_string(),
                body: r#"<div><img src="https://img.test/a.jpg"/></div>"#.to_string(),
                image_urls: BTreeSet::from(["https://img.test/a.jpg".to_string()]),
                source_url: "https://site.test/0.html".to_string(),
            })
            .unwrap();
        slots.complete().unwrap()
    }

    #[tokio::test]
    async fn scaffold_creates_layout_and_clears_old_content() -> Result<(), EpubError> {
        let tmp = tempfile::tempdir().map_err(|e| EpubError::io(Path::new("tmp"), e))?;
        let layout = NovelLayout::new(tmp.path(), "Book");
        std::fs::create_dir_all(layout.root()).unwrap();
        std::fs::write(layout.root().join("stale.txt"), "x").unwrap();

        scaffold(&layout).await?;
        assert!(!layout.root().join("stale.txt").exists());
        for dir in ["META-INF", "OEBPS/Text", "OEBPS/Images", "OEBPS/FONTS", "OEBPS/STYLES"] {
            assert!(layout.root().join(dir).is_dir(), "{} missing", dir);
        }
        Ok(())
    }

    #[tokio::test]
    async fn assemble_writes_documents_and_rewrites_resolved_images() -> Result<(), EpubError> {
        let tmp = tempfile::tempdir().map_err(|e| EpubError::io(Path::new("tmp"), e))?;
        let layout = NovelLayout::new(tmp.path(), "Book");
        scaffold(&layout).await?;
        let resources = Resources::default();
        write_cover(&layout, &resources.default_cover).await?;
        let mut map = IllustrationMap::new();
        map.insert("https://img.test/a.jpg", "aaaa.jpg");

        let assembly = assemble(&layout, &meta(), &chapters(), &map, &resources).await?;
        assert_eq!(
            assembly,
            Assembly {
                manifest_items: 1 + 2 + 1 + (1 + 1),
                spine_items: 1 + 2,
                nav_points: 3,
            }
        );

        let zero = std::fs::read_to_string(layout.chapter_path(0)).unwrap();
        assert!(zero.contains(r#"src="../Images/aaaa.jpg""#));
        assert!(zero.contains("<h1>One</h1>"));
        let one = std::fs::read_to_string(layout.chapter_path(1)).unwrap();
        assert!(one.contains("https://img.test/missing.jpg"));
        assert!(layout.text_dir().join("titlepage.xhtml").is_file());
        assert!(layout.oebps().join("content.opf").is_file());
        assert!(layout.oebps().join("toc.ncx").is_file());
        assert_eq!(
            std::fs::read(layout.root().join("mimetype")).unwrap(),
            b"application/epub+zip"
        );
        assert_eq!(
            std::fs::read(layout.meta_inf().join("container.xml")).unwrap(),
            CONTAINER_XML
        );
        Ok(())
    }

    #[tokio::test]
    async fn resources_fall_back_per_file() -> Result<(), EpubError> {
        let tmp = tempfile::tempdir().map_err(|e| EpubError::io(Path::new("tmp"), e))?;
        std::fs::write(tmp.path().join("default_cover.jpg"), b"custom").unwrap();
        let loaded = Resources::load(tmp.path()).await?;
        assert_eq!(loaded.default_cover, b"custom");
        assert_eq!(loaded.mimetype, MIMETYPE);
        assert_eq!(loaded.container_xml, CONTAINER_XML);
        Ok(())
    }
}

//! esjpub: concurrent ESJ Zone novel downloader that packages each novel as an EPUB 2 file.

pub mod cli;
pub mod config;
pub mod epub;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod scraper;

// Re-exports for CLI and consumers.
pub use epub::{EpubError, NovelLayout, Resources};
pub use model::{Chapter, NovelMeta};
pub use pipeline::illustrations::ImageLimiter;
pub use pipeline::novel::{build_novel, NovelError, NovelFailure, Stage};
pub use pipeline::{run_novels, PipelineContext, RunReport};
pub use scraper::{Credentials, Fetcher, ScraperError, SessionClient, SessionClientBuilder};

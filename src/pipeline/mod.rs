//! Novel scheduling: one task per novel, each running the chapter and illustration
//! pipelines behind their barriers before assembly.

pub mod chapters;
pub mod illustrations;
pub mod novel;
pub mod policy;

#[cfg(test)]
pub(crate) mod testing;

use crate::epub::{EpubError, Resources};
use crate::scraper::Fetcher;
use illustrations::ImageLimiter;
use novel::{build_novel, NovelError, NovelFailure, Stage};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Everything a novel run shares with its siblings.
pub struct PipelineContext {
    pub fetcher: Arc<dyn Fetcher>,
    /// Process-wide illustration download limit.
    pub limiter: ImageLimiter,
    pub resources: Resources,
    /// Staging directories live under here, one per novel.
    pub root_dir: PathBuf,
    pub output_dir: PathBuf,
    titles: Mutex<HashSet<String>>,
}

impl PipelineContext {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        limiter: ImageLimiter,
        resources: Resources,
        root_dir: PathBuf,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            resources,
            root_dir,
            output_dir,
            titles: Mutex::new(HashSet::new()),
        }
    }

    /// Reserve `stem` for this run. A stem can be claimed once; later claims fail.
    pub async fn claim_title(&self, stem: &str) -> Result<(), EpubError> {
        if self.titles.lock().await.insert(stem.to_string()) {
            Ok(())
        } else {
            Err(EpubError::TitleInUse {
                stem: stem.to_string(),
            })
        }
    }
}

/// Result for one listing URL.
#[derive(Debug)]
pub struct NovelOutcome {
    pub url: String,
    pub result: Result<PathBuf, NovelError>,
}

/// Outcomes of a run, one per distinct URL in first-seen order.
#[derive(Debug)]
pub struct RunReport {
    pub outcomes: Vec<NovelOutcome>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Flat, serializable form of the report.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            elapsed_secs: self.elapsed.as_secs_f64(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            novels: self
                .outcomes
                .iter()
                .map(|o| match &o.result {
                    Ok(path) => NovelSummary {
                        url: o.url.clone(),
                        ok: true,
                        epub: Some(path.display().to_string()),
                        title: None,
                        stage: None,
                        error: None,
                    },
                    Err(e) => NovelSummary {
                        url: o.url.clone(),
                        ok: false,
                        epub: None,
                        title: e.title.clone(),
                        stage: Some(e.stage),
                        error: Some(e.source.to_string()),
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub elapsed_secs: f64,
    pub succeeded: usize,
    pub failed: usize,
    pub novels: Vec<NovelSummary>,
}

#[derive(Debug, Serialize)]
pub struct NovelSummary {
    pub url: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Remove `dir` if present and create it empty.
async fn recreate_dir(dir: &Path) -> Result<(), EpubError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(EpubError::io(dir, e)),
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| EpubError::io(dir, e))
}

/// Build every novel in `urls` concurrently.
///
/// The output directory is wiped first. Duplicate URLs run once. A failing novel never
/// cancels its siblings; all of them are awaited before the report is returned.
pub async fn run_novels(
    ctx: Arc<PipelineContext>,
    urls: &[String],
) -> Result<RunReport, EpubError> {
    let started = Instant::now();
    recreate_dir(&ctx.output_dir).await?;
    tokio::fs::create_dir_all(&ctx.root_dir)
        .await
        .map_err(|e| EpubError::io(&ctx.root_dir, e))?;

    let mut seen = HashSet::new();
    let mut unique: Vec<String> = Vec::new();
    for url in urls {
        if seen.insert(url.as_str()) {
            unique.push(url.clone());
        } else {
            tracing::warn!(url = %url, "duplicate URL; building once");
        }
    }
    tracing::info!(novels = unique.len(), "starting run");

    // Every novel is spawned before any is awaited; awaiting the handles in order is the
    // barrier and keeps outcomes in input order.
    let handles: Vec<_> = unique
        .into_iter()
        .map(|url| {
            let ctx = Arc::clone(&ctx);
            let task_url = url.clone();
            let handle = tokio::spawn(async move { build_novel(&ctx, &task_url).await });
            (url, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (url, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "novel task did not complete");
                Err(NovelError {
                    url: url.clone(),
                    title: None,
                    stage: Stage::Init,
                    source: NovelFailure::Task(e.to_string()),
                })
            }
        };
        outcomes.push(NovelOutcome { url, result });
    }

    let report = RunReport {
        outcomes,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        elapsed_secs = report.elapsed.as_secs_f64(),
        "run finished"
    );
    Ok(report)
}

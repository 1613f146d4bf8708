//! CLI parsing and orchestration. Resolves settings from flags and config, runs every novel,
//! and maps the outcome to an exit code.

use crate::config::{self, Config};
use crate::epub::{EpubError, Resources};
use crate::pipeline::illustrations::ImageLimiter;
use crate::pipeline::{run_novels, PipelineContext, RunReport};
use crate::scraper::{validate_listing_url, Credentials, ScraperError, SessionClient};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_ROOT_DIR: &str = "esjNovelRaw";
const DEFAULT_OUTPUT_DIR: &str = "esjNovel";
const DEFAULT_RESOURCES_DIR: &str = "resources";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Client(#[from] ScraperError),

    #[error("{0}")]
    Setup(#[from] EpubError),

    #[error("{failed} of {total} novel(s) failed")]
    NovelsFailed { failed: usize, total: usize },
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) | CliRunError::Client(_) | CliRunError::Setup(_) => 1,
            CliRunError::NovelsFailed { .. } => 2,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "esjpub")]
#[command(about = "Download ESJ Zone novels and package each one as an EPUB")]
#[command(
    after_help = "Config file keys (ews_key, ews_token, novel_urls, root_dir, output_dir, resources_dir, user_agent, timeout_secs, image_concurrency) are read from --config, ./esjpub.toml or the user config directory. CLI flags override config."
)]
pub struct Args {
    /// Novel listing URLs. Default: novel_urls from the config file.
    pub urls: Vec<String>,

    /// Config file path (overrides the search order).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Staging directory for unpacked novels (default: esjNovelRaw).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Output directory for .epub files (default: esjNovel). Its contents are replaced.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory with container.xml, mimetype and default_cover.jpg (default: resources).
    #[arg(long)]
    pub resources: Option<PathBuf>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Concurrent illustration downloads across all novels (overrides config; default 400).
    #[arg(long)]
    pub image_concurrency: Option<usize>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Write a JSON summary of the run to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Debug logging and the full error chain on failure.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Effective settings after merging flags over config over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub urls: Vec<String>,
    pub credentials: Credentials,
    pub root_dir: PathBuf,
    pub output_dir: PathBuf,
    pub resources_dir: PathBuf,
    pub user_agent: Option<String>,
    pub timeout_secs: u64,
    pub image_concurrency: usize,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Merge `args` over `config`. Fails when no URL is given, a URL is not http(s), or the
/// session cookie values are missing.
pub fn resolve_settings(args: &Args, config: Option<Config>) -> Result<Settings, CliRunError> {
    let config = config.unwrap_or_default();

    let raw_urls = if args.urls.is_empty() {
        config.novel_urls.unwrap_or_default()
    } else {
        args.urls.clone()
    };
    if raw_urls.is_empty() {
        return Err(CliRunError::InvalidInput(
            "No novel URLs. Pass listing URLs as arguments or set novel_urls in the config file."
                .to_string(),
        ));
    }
    let urls = raw_urls
        .iter()
        .map(|u| {
            validate_listing_url(u).map_err(|e| {
                CliRunError::InvalidInput(format!(
                    "Expected a novel listing URL such as https://www.esjzone.cc/detail/1234.html. {}",
                    e
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let (ews_key, ews_token) = match (non_empty(config.ews_key), non_empty(config.ews_token)) {
        (Some(k), Some(t)) => (k, t),
        _ => {
            return Err(CliRunError::InvalidInput(
                "ews_key and ews_token must both be set in the config file.".to_string(),
            ))
        }
    };

    Ok(Settings {
        urls,
        credentials: Credentials::new(ews_key, ews_token),
        root_dir: args
            .root
            .clone()
            .or(config.root_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_DIR)),
        output_dir: args
            .output
            .clone()
            .or(config.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        resources_dir: args
            .resources
            .clone()
            .or(config.resources_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESOURCES_DIR)),
        user_agent: args.user_agent.clone().or(config.user_agent),
        timeout_secs: args
            .timeout
            .or(config.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
        image_concurrency: args
            .image_concurrency
            .or(config.image_concurrency)
            .unwrap_or(ImageLimiter::DEFAULT_PERMITS)
            .max(1),
    })
}

fn write_report(report: &RunReport, path: &Path) -> Result<(), CliRunError> {
    let json = serde_json::to_string_pretty(&report.summary())
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to encode report: {}", e)))?;
    std::fs::write(path, json).map_err(|e| {
        CliRunError::InvalidInput(format!("Cannot write report {}: {}", path.display(), e))
    })
}

/// Entry point for the CLI. Returns the run report when every novel was packaged.
pub async fn run(args: &Args) -> Result<RunReport, CliRunError> {
    let config = config::load_config(args.config.as_deref()).map_err(CliRunError::InvalidInput)?;
    let settings = resolve_settings(args, config)?;

    let mut builder = SessionClient::builder()
        .credentials(settings.credentials.clone())
        .timeout_secs(settings.timeout_secs);
    if let Some(ua) = &settings.user_agent {
        builder = builder.user_agent(ua.clone());
    }
    let client = builder.build()?;
    let resources = Resources::load(&settings.resources_dir).await?;

    let ctx = Arc::new(PipelineContext::new(
        Arc::new(client),
        ImageLimiter::new(settings.image_concurrency),
        resources,
        settings.root_dir.clone(),
        settings.output_dir.clone(),
    ));
    let report = run_novels(ctx, &settings.urls).await?;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(path) => tracing::info!(url = %outcome.url, file = %path.display(), "ok"),
            Err(e) => tracing::error!(
                url = %outcome.url,
                novel = e.title.as_deref().unwrap_or("-"),
                stage = %e.stage,
                error = %e.source,
                "failed"
            ),
        }
    }
    tracing::info!("total elapsed {:.2}s", report.elapsed.as_secs_f64());

    if let Some(path) = &args.report {
        write_report(&report, path)?;
    }
    if !report.all_succeeded() {
        return Err(CliRunError::NovelsFailed {
            failed: report.failed(),
            total: report.outcomes.len(),
        });
    }
    Ok(report)
}

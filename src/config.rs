//! Optional config file loading. Search order: `--config PATH`, then ./esjpub.toml, then
//! $XDG_CONFIG_HOME/esjpub/config.toml (or ~/.config/esjpub/config.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file contents. All fields optional; CLI flags override present keys.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Session cookie values from a logged-in browser session.
    pub ews_key: Option<String>,
    pub ews_token: Option<String>,
    /// Listing URLs to build when none are given on the command line.
    pub novel_urls: Option<Vec<String>>,
    /// Staging directory for unpacked novels (default `esjNovelRaw`).
    pub root_dir: Option<PathBuf>,
    /// Directory for finished `.epub` files (default `esjNovel`). Wiped on every run.
    pub output_dir: Option<PathBuf>,
    /// Directory holding `container.xml`, `mimetype` and `default_cover.jpg`.
    pub resources_dir: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Concurrent illustration downloads across all novels (default 400).
    pub image_concurrency: Option<usize>,
}

fn read_config(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}

/// Load `explicit` if given (it must exist); otherwise the first file found in the search
/// order. No file found returns Ok(None). Invalid TOML or an unreadable file returns Err.
pub fn load_config(explicit: Option<&Path>) -> Result<Option<Config>, String> {
    if let Some(path) = explicit {
        return read_config(path).map(Some);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("esjpub.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("esjpub").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            tracing::debug!(file = %path.display(), "loading config");
            return read_config(path).map(Some);
        }
    }
    Ok(None)
}

//! Packaging: zip a staging directory and move it into place as `<stem>.epub`.

use crate::epub::EpubError;
use std::ffi::OsString;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const MIMETYPE_ENTRY: &str = "mimetype";

/// Zip `staging` into `<staging>.zip`, then move it to `<output_dir>/<stem>.epub`.
///
/// Runs the zip work on the blocking pool. On failure the partial `.zip` is removed and no
/// `.epub` is left behind.
pub async fn package(
    staging: &Path,
    output_dir: &Path,
    stem: &str,
) -> Result<PathBuf, EpubError> {
    let destination = output_dir.join(format!("{}.epub", stem));
    if tokio::fs::try_exists(&destination)
        .await
        .map_err(|e| EpubError::io(&destination, e))?
    {
        return Err(EpubError::DestinationExists { path: destination });
    }
    let zip_path = sibling_zip(staging);

    let src = staging.to_path_buf();
    let target = zip_path.clone();
    let zipped = tokio::task::spawn_blocking(move || zip_directory(&src, &target))
        .await
        .map_err(|e| EpubError::Join(e.to_string()))
        .and_then(|r| r);
    if let Err(e) = zipped {
        remove_quietly(&zip_path).await;
        return Err(e);
    }

    if let Err(e) = move_file(&zip_path, &destination).await {
        remove_quietly(&zip_path).await;
        return Err(e);
    }
    tracing::info!(file = %destination.display(), "epub written");
    Ok(destination)
}

/// Write every file under `src_dir` into a new zip at `zip_path`.
///
/// `mimetype` goes first and is stored uncompressed; everything else is deflated. Entry names
/// are relative to `src_dir` with `/` separators, in sorted order.
pub fn zip_directory(src_dir: &Path, zip_path: &Path) -> Result<(), EpubError> {
    let file = File::create(zip_path).map_err(|e| EpubError::io(zip_path, e))?;
    let mut zip = ZipWriter::new(file);
    let stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    let deflated = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mimetype = src_dir.join(MIMETYPE_ENTRY);
    let bytes = std::fs::read(&mimetype).map_err(|e| EpubError::io(&mimetype, e))?;
    zip.start_file(MIMETYPE_ENTRY, stored)?;
    zip.write_all(&bytes)?;

    let mut buffer = Vec::new();
    for entry in WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src_dir).to_path_buf();
            EpubError::io(&path, e.into())
        })?;
        let path = entry.path();
        let name = entry_name(src_dir, path)?;
        if name == MIMETYPE_ENTRY {
            continue;
        }
        if entry.file_type().is_dir() {
            zip.add_directory(name, deflated)?;
            continue;
        }
        buffer.clear();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut buffer))
            .map_err(|e| EpubError::io(path, e))?;
        zip.start_file(name, deflated)?;
        zip.write_all(&buffer)?;
    }
    zip.finish()?;
    Ok(())
}

/// `<dir>.zip` next to `dir`. Stems may contain dots, so the extension is appended.
fn sibling_zip(dir: &Path) -> PathBuf {
    let mut name = dir.file_name().map(OsString::from).unwrap_or_default();
    name.push(".zip");
    dir.with_file_name(name)
}

fn entry_name(root: &Path, path: &Path) -> Result<String, EpubError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| EpubError::OutsideStaging {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })?;
    let parts = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| EpubError::NonUtf8Path {
                path: path.to_path_buf(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("/"))
}

/// Rename, falling back to copy + remove when the rename crosses filesystems.
async fn move_file(from: &Path, to: &Path) -> Result<(), EpubError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| EpubError::io(to, e))?;
    tokio::fs::remove_file(from)
        .await
        .map_err(|e| EpubError::io(from, e))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(file = %path.display(), error = %e, "could not remove partial archive");
        }
    }
}

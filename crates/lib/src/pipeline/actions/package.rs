//! Package action implementation.
//!
//! Produces zip archives for function deployments. Archives are
//! reproducible: entries are sorted and every timestamp is pinned to the zip
//! epoch, so unchanged sources produce byte-identical artifacts and the
//! provisioning engine sees no spurious code change.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::pipeline::types::BuildError;
use crate::util::hash::{ContentHash, hash_directory, hash_file};

/// Summary of a written archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageResult {
  pub archive: PathBuf,
  /// Digest of the packaged source tree.
  pub source_hash: ContentHash,
  /// Digest of the archive bytes.
  pub archive_hash: ContentHash,
}

/// Zip `source` (a directory or a single file) into `dest`.
///
/// Entries whose file name appears in `exclude` are skipped together with
/// everything below them.
pub async fn execute_package(source: &Path, dest: &Path, exclude: &[String]) -> Result<PackageResult, BuildError> {
  let source = source.to_path_buf();
  let dest = dest.to_path_buf();
  let exclude = exclude.to_vec();

  tokio::task::spawn_blocking(move || package_blocking(&source, &dest, &exclude))
    .await
    .map_err(|e| BuildError::Failed(format!("packaging task panicked: {e}")))?
}

fn package_blocking(source: &Path, dest: &Path, exclude: &[String]) -> Result<PackageResult, BuildError> {
  let package_err = |message: String| BuildError::Package {
    path: dest.to_path_buf(),
    message,
  };

  if let Some(parent) = dest.parent() {
    std::fs::create_dir_all(parent)?;
  }

  let excluded: Vec<&str> = exclude.iter().map(String::as_str).collect();
  let base = if source.is_file() {
    source.parent().unwrap_or(source)
  } else {
    source
  };

  let mut writer = ZipWriter::new(File::create(dest)?);
  let options = SimpleFileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(DateTime::default());

  let walker = WalkDir::new(source).sort_by_file_name().into_iter().filter_entry(|e| {
    e.file_name()
      .to_str()
      .map(|name| !excluded.contains(&name))
      .unwrap_or(true)
  });

  for entry in walker {
    let entry = entry.map_err(|e| package_err(e.to_string()))?;
    let rel = entry
      .path()
      .strip_prefix(base)
      .map_err(|e| package_err(e.to_string()))?
      .to_string_lossy()
      .replace('\\', "/");
    if rel.is_empty() {
      continue;
    }

    if entry.file_type().is_dir() {
      writer
        .add_directory(format!("{rel}/"), options)
        .map_err(|e| package_err(e.to_string()))?;
      continue;
    }

    writer
      .start_file(rel, options.unix_permissions(file_mode(entry.path())?))
      .map_err(|e| package_err(e.to_string()))?;
    let mut file = File::open(entry.path())?;
    io::copy(&mut file, &mut writer)?;
  }

  writer.finish().map_err(|e| package_err(e.to_string()))?.flush()?;

  let source_hash = if source.is_file() {
    hash_file(source)
  } else {
    hash_directory(source, &excluded)
  }
  .map_err(|e| package_err(e.to_string()))?;
  let archive_hash = hash_file(dest).map_err(|e| package_err(e.to_string()))?;

  info!(archive = ?dest, source_hash = %source_hash, "package written");

  Ok(PackageResult {
    archive: dest.to_path_buf(),
    source_hash,
    archive_hash,
  })
}

#[cfg(unix)]
fn file_mode(path: &Path) -> io::Result<u32> {
  use std::os::unix::fs::PermissionsExt;
  Ok(std::fs::metadata(path)?.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> io::Result<u32> {
  Ok(0o644)
}

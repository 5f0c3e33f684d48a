//! FetchUrl action implementation.
//!
//! Downloads toolchain archives (engine plugins, cross linkers, wasm runtimes)
//! with SHA256 verification. One attempt only; failures are reported as
//! toolchain errors.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::pipeline::types::{BuildError, ToolchainError};
use crate::util::hash::{digest_hex, hash_bytes};

/// Download `url` into the directory `dest_dir` and verify its hash.
///
/// An existing file with the expected hash is reused without a request.
/// The file is written to a `.part` sibling first and renamed once verified,
/// so a failed download never leaves a file that looks complete.
///
/// # Returns
///
/// The path to the verified file.
pub async fn execute_fetch(url: &str, expected_sha256: &str, dest_dir: &Path) -> Result<PathBuf, BuildError> {
  info!(url = %url, "fetching URL");

  fs::create_dir_all(dest_dir).await?;
  let dest_path = dest_dir.join(url_to_filename(url));
  let expected = expected_sha256.to_ascii_lowercase();

  if let Ok(existing) = fs::read(&dest_path).await {
    let actual = hash_bytes(&existing).0;
    if actual == expected {
      info!(path = ?dest_path, "using cached download");
      return Ok(dest_path);
    }
    debug!(expected = %expected, actual = %actual, "cached file hash mismatch, re-downloading");
  }

  let download_err = |message: String| ToolchainError::Download {
    url: url.to_string(),
    message,
  };

  let response = reqwest::get(url).await.map_err(|e| download_err(e.to_string()))?;
  if !response.status().is_success() {
    return Err(download_err(format!("HTTP {}", response.status())).into());
  }
  let bytes = response.bytes().await.map_err(|e| download_err(e.to_string()))?;

  let actual = hash_bytes(&bytes).0;
  if actual != expected {
    return Err(
      ToolchainError::HashMismatch {
        url: url.to_string(),
        expected,
        actual,
      }
      .into(),
    );
  }

  let partial = dest_path.with_extension("part");
  fs::write(&partial, &bytes).await?;
  fs::rename(&partial, &dest_path).await?;

  info!(path = ?dest_path, size = bytes.len(), "download complete");

  Ok(dest_path)
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component and sanitizes it. Falls back to a hash of
/// the URL if no suitable filename can be extracted.
fn url_to_filename(url: &str) -> String {
  let last = url.rsplit('/').next().unwrap_or_default();
  let last = last.split(['?', '#']).next().unwrap_or(last);

  let sanitized: String = last
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
        c
      } else {
        '_'
      }
    })
    .collect();

  if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
    return format!("download_{}", digest_hex(url, 16));
  }

  sanitized
}

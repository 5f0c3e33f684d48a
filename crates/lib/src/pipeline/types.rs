//! Types for build pipeline execution.
//!
//! This module defines the error types, the per-step environment, and the
//! report returned by a successful pipeline run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::platform::Platform;

/// Problems with the tools a build step depends on.
///
/// These are setup failures rather than failures of the build itself; the
/// caller decides whether to report and abort.
#[derive(Debug, Error)]
pub enum ToolchainError {
  /// The host OS or architecture is not supported.
  #[error("unsupported host platform: {os}/{arch}")]
  UnsupportedPlatform { os: String, arch: String },

  /// The executable could not be spawned.
  #[error("tool not found: {bin}")]
  Missing { bin: String },

  /// HTTP request failed while downloading a toolchain artifact.
  #[error("download failed for {url}: {message}")]
  Download { url: String, message: String },

  /// SHA256 hash mismatch after download.
  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },
}

/// Errors that can occur while running a single build step.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Toolchain(#[from] ToolchainError),

  /// Process exited unsuccessfully. `stderr` holds the tool's diagnostics.
  #[error("command failed with exit code {code:?}: {cmd}\n{stderr}")]
  Process {
    cmd: String,
    code: Option<i32>,
    stderr: String,
  },

  /// Creating a deployment archive failed.
  #[error("packaging failed for {path}: {message}")]
  Package { path: PathBuf, message: String },

  /// A custom step reported failure.
  #[error("{0}")]
  Failed(String),

  /// I/O error during execution.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// A failed pipeline run. Steps after `index` were not executed.
#[derive(Debug, Error)]
#[error("build step {index} ({name}) failed: {source}")]
pub struct PipelineError {
  pub index: usize,
  pub name: String,
  #[source]
  pub source: BuildError,
}

/// Everything a build step may consult while running.
#[derive(Debug, Clone)]
pub struct BuildEnv {
  /// The host platform steps compile for by default.
  pub platform: Platform,

  /// Base directory relative paths are resolved against.
  pub work_dir: PathBuf,
}

impl BuildEnv {
  /// Detect the host platform.
  ///
  /// # Errors
  ///
  /// Returns `UnsupportedPlatform` on hosts outside the supported set.
  pub fn detect(work_dir: impl Into<PathBuf>) -> Result<Self, ToolchainError> {
    let platform = Platform::current().ok_or_else(|| ToolchainError::UnsupportedPlatform {
      os: std::env::consts::OS.to_string(),
      arch: std::env::consts::ARCH.to_string(),
    })?;
    Ok(Self::new(platform, work_dir))
  }

  pub fn new(platform: Platform, work_dir: impl Into<PathBuf>) -> Self {
    Self {
      platform,
      work_dir: work_dir.into(),
    }
  }

  /// Resolve `path` against the working directory.
  pub fn resolve(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.work_dir.join(path)
    }
  }
}

/// Result of one completed step.
#[derive(Debug, Clone)]
pub struct StepReport {
  pub name: String,
  pub duration: Duration,
}

/// Result of a fully successful pipeline run.
#[derive(Debug, Default)]
pub struct PipelineReport {
  pub steps: Vec<StepReport>,
}

impl PipelineReport {
  pub fn total_duration(&self) -> Duration {
    self.steps.iter().map(|s| s.duration).sum()
  }
}

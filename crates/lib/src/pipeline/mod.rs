//! Deferred build pipeline.
//!
//! Build operations (compiling for a target, building a container image,
//! zipping a function bundle) are queued with
//! [`BuildContext::defer_build`](crate::context::BuildContext::defer_build)
//! while the graph is declared, and only run after synthesis.
//!
//! # Ordering
//!
//! Operations run strictly one at a time, in the order they were deferred.
//! Later steps may consume artifacts produced by earlier ones, and process
//! output stays attributable to a single step.
//!
//! # Failure
//!
//! The first failing step aborts the run; remaining steps never start. There
//! are no retries, and partial artifacts are left in place for the next run
//! to overwrite.

pub mod actions;
mod types;

pub use types::*;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info};

use crate::platform::Platform;
use actions::exec::{ExecOpts, execute_exec};
use actions::fetch::execute_fetch;
use actions::package::execute_package;

/// A user-defined build step.
#[async_trait]
pub trait BuildStep: Send + Sync {
  /// Short label used in logs and errors.
  fn name(&self) -> String;

  async fn run(&self, env: &BuildEnv) -> Result<(), BuildError>;
}

/// One deferred unit of build work.
#[derive(Clone)]
pub enum BuildOp {
  /// Run an external program.
  Exec(ExecOpts),
  /// Download a verified file into `dest_dir`.
  FetchUrl {
    url: String,
    sha256: String,
    dest_dir: PathBuf,
  },
  /// Zip `source` into `dest`.
  Package {
    source: PathBuf,
    dest: PathBuf,
    exclude: Vec<String>,
  },
  Custom(Arc<dyn BuildStep>),
}

impl BuildOp {
  pub fn exec(opts: ExecOpts) -> Self {
    BuildOp::Exec(opts)
  }

  /// `cargo build` for `target` (e.g. `aarch64-unknown-linux-musl`, `wasm32-wasip1`).
  pub fn cargo_build(manifest_path: impl Into<PathBuf>, target: &str, release: bool) -> Self {
    let manifest_path: PathBuf = manifest_path.into();
    let mut opts = ExecOpts::new("cargo")
      .args(["build", "--manifest-path"])
      .arg(manifest_path.to_string_lossy())
      .args(["--target", target]);
    if release {
      opts = opts.arg("--release");
    }
    BuildOp::Exec(opts)
  }

  /// `docker build` of `context` for the container flavour of `platform`.
  pub fn container_build(context: impl Into<PathBuf>, dockerfile: &str, tag: &str, platform: Platform) -> Self {
    let context: PathBuf = context.into();
    BuildOp::Exec(
      ExecOpts::new("docker")
        .args(["build", "--platform"])
        .arg(platform.container_platform())
        .args(["--file", dockerfile, "--tag", tag])
        .arg(context.to_string_lossy()),
    )
  }

  pub fn fetch_url(url: &str, sha256: &str, dest_dir: impl Into<PathBuf>) -> Self {
    BuildOp::FetchUrl {
      url: url.to_string(),
      sha256: sha256.to_string(),
      dest_dir: dest_dir.into(),
    }
  }

  pub fn package(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
    BuildOp::Package {
      source: source.into(),
      dest: dest.into(),
      exclude: Vec::new(),
    }
  }

  pub fn custom(step: impl BuildStep + 'static) -> Self {
    BuildOp::Custom(Arc::new(step))
  }

  pub fn name(&self) -> String {
    match self {
      BuildOp::Exec(opts) => opts.display(),
      BuildOp::FetchUrl { url, .. } => format!("fetch {url}"),
      BuildOp::Package { dest, .. } => format!("package {}", dest.display()),
      BuildOp::Custom(step) => step.name(),
    }
  }

  async fn run(&self, env: &BuildEnv) -> Result<(), BuildError> {
    match self {
      BuildOp::Exec(opts) => execute_exec(opts, &env.work_dir).await.map(drop),
      BuildOp::FetchUrl { url, sha256, dest_dir } => {
        execute_fetch(url, sha256, &env.resolve(dest_dir)).await.map(drop)
      }
      BuildOp::Package { source, dest, exclude } => {
        execute_package(&env.resolve(source), &env.resolve(dest), exclude)
          .await
          .map(drop)
      }
      BuildOp::Custom(step) => step.run(env).await,
    }
  }
}

impl fmt::Debug for BuildOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildOp::Exec(opts) => f.debug_tuple("Exec").field(opts).finish(),
      BuildOp::FetchUrl { url, sha256, dest_dir } => f
        .debug_struct("FetchUrl")
        .field("url", url)
        .field("sha256", sha256)
        .field("dest_dir", dest_dir)
        .finish(),
      BuildOp::Package { source, dest, exclude } => f
        .debug_struct("Package")
        .field("source", source)
        .field("dest", dest)
        .field("exclude", exclude)
        .finish(),
      BuildOp::Custom(step) => f.debug_tuple("Custom").field(&step.name()).finish(),
    }
  }
}

/// The ordered list of deferred operations captured by one build context.
#[derive(Debug, Default, Clone)]
pub struct Pipeline {
  ops: Vec<BuildOp>,
}

impl Pipeline {
  pub fn new(ops: Vec<BuildOp>) -> Self {
    Self { ops }
  }

  pub fn ops(&self) -> &[BuildOp] {
    &self.ops
  }

  pub fn len(&self) -> usize {
    self.ops.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }

  /// Run every operation sequentially, stopping at the first failure.
  pub async fn run(&self, env: &BuildEnv) -> Result<PipelineReport, PipelineError> {
    info!(steps = self.ops.len(), platform = %env.platform, "starting build pipeline");

    let mut report = PipelineReport::default();
    for (index, op) in self.ops.iter().enumerate() {
      let name = op.name();
      info!(step = index, name = %name, "running build step");

      let started = Instant::now();
      if let Err(source) = op.run(env).await {
        error!(step = index, name = %name, error = %source, "build step failed");
        return Err(PipelineError { index, name, source });
      }

      let duration = started.elapsed();
      info!(step = index, name = %name, elapsed_ms = duration.as_millis() as u64, "build step finished");
      report.steps.push(StepReport { name, duration });
    }

    info!(steps = report.steps.len(), "build pipeline complete");
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::{Arch, Os};
  use std::sync::Mutex;
  use tracing_test::traced_test;

  /// Records its label into a shared log, optionally failing.
  struct Recorder {
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
  }

  #[async_trait]
  impl BuildStep for Recorder {
    fn name(&self) -> String {
      self.label.to_string()
    }

    async fn run(&self, _env: &BuildEnv) -> Result<(), BuildError> {
      self.log.lock().unwrap().push(self.label);
      if self.fail {
        return Err(BuildError::Failed(format!("{} exploded", self.label)));
      }
      Ok(())
    }
  }

  fn recorder(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, fail: bool) -> BuildOp {
    BuildOp::custom(Recorder {
      label,
      log: log.clone(),
      fail,
    })
  }

  fn env() -> BuildEnv {
    BuildEnv::new(Platform::new(Arch::X86_64, Os::Linux), std::env::temp_dir())
  }

  #[tokio::test]
  async fn runs_in_declaration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new(vec![
      recorder("op1", &log, false),
      recorder("op2", &log, false),
      recorder("op3", &log, false),
    ]);

    let report = pipeline.run(&env()).await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["op1", "op2", "op3"]);
    let names: Vec<_> = report.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["op1", "op2", "op3"]);
  }

  #[tokio::test]
  #[traced_test]
  async fn failure_stops_remaining_steps() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new(vec![
      recorder("op1", &log, false),
      recorder("op2", &log, true),
      recorder("op3", &log, false),
    ]);

    let err = pipeline.run(&env()).await.unwrap_err();

    assert_eq!(err.index, 1);
    assert_eq!(err.name, "op2");
    assert!(matches!(err.source, BuildError::Failed(_)));
    assert_eq!(*log.lock().unwrap(), vec!["op1", "op2"]);
    assert!(logs_contain("build step failed"));
  }

  #[tokio::test]
  async fn empty_pipeline_succeeds() {
    let report = Pipeline::default().run(&env()).await.unwrap();
    assert!(report.steps.is_empty());
  }

  #[test]
  fn cargo_build_arguments() {
    let op = BuildOp::cargo_build("services/api/Cargo.toml", "wasm32-wasip1", true);
    assert_eq!(
      op.name(),
      "cargo build --manifest-path services/api/Cargo.toml --target wasm32-wasip1 --release"
    );
  }

  #[test]
  fn container_build_targets_linux_for_the_platform_arch() {
    let platform = Platform::new(Arch::Aarch64, Os::MacOs);
    let op = BuildOp::container_build("services/web", "Dockerfile", "web:dev", platform);
    assert_eq!(
      op.name(),
      "docker build --platform linux/arm64 --file Dockerfile --tag web:dev services/web"
    );
  }

  #[test]
  fn debug_hides_custom_step_internals() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let op = recorder("bundle", &log, false);
    assert_eq!(format!("{op:?}"), "Custom(\"bundle\")");
  }
}

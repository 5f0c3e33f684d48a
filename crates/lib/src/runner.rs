//! End-to-end driver: declare, synthesize, write, build.
//!
//! Configuration comes from `NIMBUS_*` environment variables so the same
//! declaration binary runs unchanged on a laptop and in CI.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::codegen;
use crate::consts::{DEFAULT_OUT_DIR, DEFAULT_PROJECT, DEFAULT_STAGE, NAME_SEPARATOR};
use crate::context::BuildContext;
use crate::naming::tokenize;
use crate::pipeline::{BuildEnv, PipelineError, PipelineReport, ToolchainError};
use crate::project::{ProjectFormat, SynthError, UnknownFormat};

pub const STAGE_VAR: &str = "NIMBUS_STAGE";
pub const PROJECT_VAR: &str = "NIMBUS_PROJECT";
pub const OUT_DIR_VAR: &str = "NIMBUS_OUT_DIR";
pub const FORMAT_VAR: &str = "NIMBUS_FORMAT";
pub const SKIP_BUILD_VAR: &str = "NIMBUS_SKIP_BUILD";

/// File the typed link accessors are written to, inside the output directory.
pub const ACCESSORS_FILE: &str = "links.rs";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error(transparent)]
  Format(#[from] UnknownFormat),

  #[error("invalid value `{value}` for {var} (expected 1/0, true/false, yes/no)")]
  InvalidFlag { var: String, value: String },

  #[error("cannot determine working directory: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RunError {
  #[error(transparent)]
  Synth(#[from] SynthError),

  #[error(transparent)]
  Toolchain(#[from] ToolchainError),

  #[error(transparent)]
  Pipeline(#[from] PipelineError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub stage: String,
  pub project: String,
  /// Directory relative build paths resolve against.
  pub work_dir: PathBuf,
  /// Receives the project file and link accessors.
  pub out_dir: PathBuf,
  pub format: ProjectFormat,
  pub skip_build: bool,
}

impl Config {
  /// Defaults rooted at `work_dir`, with the stage taken from the user name.
  pub fn new(work_dir: impl Into<PathBuf>) -> Self {
    let work_dir = work_dir.into();
    Self {
      stage: default_stage(),
      project: DEFAULT_PROJECT.to_string(),
      out_dir: work_dir.join(DEFAULT_OUT_DIR),
      work_dir,
      format: ProjectFormat::default(),
      skip_build: false,
    }
  }

  /// Load from `NIMBUS_*` variables, rooted at the current directory.
  pub fn from_env() -> Result<Self, ConfigError> {
    let mut config = Self::new(std::env::current_dir()?);

    if let Some(stage) = var(STAGE_VAR) {
      config.stage = stage;
    }
    if let Some(project) = var(PROJECT_VAR) {
      config.project = project;
    }
    if let Some(out_dir) = var(OUT_DIR_VAR) {
      config.out_dir = config.work_dir.join(out_dir);
    }
    if let Some(format) = var(FORMAT_VAR) {
      config.format = format.parse()?;
    }
    if let Some(flag) = var(SKIP_BUILD_VAR) {
      config.skip_build = parse_flag(SKIP_BUILD_VAR, &flag)?;
    }

    Ok(config)
  }
}

fn var(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" => Ok(true),
    "0" | "false" | "no" => Ok(false),
    _ => Err(ConfigError::InvalidFlag {
      var: var.to_string(),
      value: value.to_string(),
    }),
  }
}

fn default_stage() -> String {
  ["USER", "USERNAME"]
    .into_iter()
    .filter_map(var)
    .map(|user| tokenize(&[user.as_str()], NAME_SEPARATOR, usize::MAX))
    .find(|stage| !stage.is_empty())
    .unwrap_or_else(|| DEFAULT_STAGE.to_string())
}

/// What a successful run produced.
#[derive(Debug)]
pub struct RunReport {
  pub project_path: PathBuf,
  pub accessors_path: Option<PathBuf>,
  /// `None` when the build was skipped.
  pub build: Option<PipelineReport>,
}

/// Declare the graph with `declare`, write the project, then run the
/// deferred builds unless `config.skip_build` is set.
///
/// Builds run only after the project file is written; a failing step aborts
/// the remaining ones and its error is returned.
pub async fn run<F>(config: &Config, declare: F) -> Result<RunReport, RunError>
where
  F: FnOnce(&BuildContext),
{
  let ctx = BuildContext::new(&config.project, &config.stage);
  info!(project = %config.project, stage = %config.stage, "declaring");
  declare(&ctx);

  let synthesis = ctx.synthesize()?;
  let project_path = synthesis.project.write(&config.out_dir, config.format)?;

  let registry = ctx.link_registry();
  let accessors_path = if registry.iter().any(|entry| !entry.properties.is_empty()) {
    let path = config.out_dir.join(ACCESSORS_FILE);
    std::fs::write(&path, codegen::accessors(&registry))?;
    info!(path = ?path, capabilities = registry.len(), "link accessors written");
    Some(path)
  } else {
    None
  };

  let build = if config.skip_build {
    info!(steps = synthesis.pipeline.len(), "build skipped");
    None
  } else {
    let env = BuildEnv::detect(&config.work_dir)?;
    Some(synthesis.pipeline.run(&env).await?)
  };

  Ok(RunReport {
    project_path,
    accessors_path,
    build,
  })
}

/// Install the global subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing(verbose: bool) {
  let default = if verbose { "nimbus_lib=debug,info" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  let _ = tracing_subscriber::fmt().with_env_filter(filter).without_time().try_init();
}

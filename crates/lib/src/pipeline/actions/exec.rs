//! Exec action implementation.
//!
//! Runs an external program (compiler, container builder, bundler) directly,
//! without a shell, inheriting the caller's environment so installed
//! toolchains stay on `PATH`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::pipeline::types::{BuildError, ToolchainError};

/// Options for an exec action.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecOpts {
  pub bin: String,
  pub args: Vec<String>,
  /// Extra variables layered over the inherited environment.
  pub env: BTreeMap<String, String>,
  /// Working directory; relative paths resolve against the pipeline's work dir.
  pub cwd: Option<PathBuf>,
}

impl ExecOpts {
  pub fn new(bin: &str) -> Self {
    Self {
      bin: bin.to_string(),
      ..Self::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, key: &str, value: &str) -> Self {
    self.env.insert(key.to_string(), value.to_string());
    self
  }

  pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  /// Shell-like rendering for logs and error messages.
  pub fn display(&self) -> String {
    std::iter::once(self.bin.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// Execute a program and return its trimmed stdout.
///
/// # Errors
///
/// - `ToolchainError::Missing` if the binary cannot be found
/// - `BuildError::Process` with captured stderr on a non-zero exit
pub async fn execute_exec(opts: &ExecOpts, work_dir: &Path) -> Result<String, BuildError> {
  let cmd_line = opts.display();
  info!(cmd = %cmd_line, "executing command");

  let working_dir = match &opts.cwd {
    Some(cwd) if cwd.is_absolute() => cwd.clone(),
    Some(cwd) => work_dir.join(cwd),
    None => work_dir.to_path_buf(),
  };

  let mut command = Command::new(&opts.bin);
  command.args(&opts.args).current_dir(&working_dir).envs(&opts.env);

  debug!(working_dir = ?working_dir, "spawning process");

  let output = command.output().await.map_err(|e| {
    if e.kind() == std::io::ErrorKind::NotFound && working_dir.is_dir() {
      BuildError::Toolchain(ToolchainError::Missing { bin: opts.bin.clone() })
    } else {
      BuildError::Io(e)
    }
  })?;

  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
  let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

  if !output.status.success() {
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }
    return Err(BuildError::Process {
      cmd: cmd_line,
      code: output.status.code(),
      stderr,
    });
  }

  if !stderr.is_empty() {
    debug!(stderr = %stderr, "command stderr");
  }
  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }

  Ok(stdout)
}

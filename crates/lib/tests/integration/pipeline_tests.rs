//! Deferred build execution after synthesis.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nimbus_lib::context::BuildContext;
use nimbus_lib::pipeline::{BuildEnv, BuildError, BuildOp, BuildStep};
use nimbus_lib::platform::Platform;
use nimbus_lib::resource::Resource;
use tempfile::TempDir;

use super::common::context;

type Log = Arc<Mutex<Vec<String>>>;

struct Step {
  label: String,
  log: Log,
  fail: bool,
}

#[async_trait]
impl BuildStep for Step {
  fn name(&self) -> String {
    self.label.clone()
  }

  async fn run(&self, _env: &BuildEnv) -> Result<(), BuildError> {
    self.log.lock().unwrap().push(self.label.clone());
    if self.fail {
      return Err(BuildError::Failed(format!("{} failed", self.label)));
    }
    Ok(())
  }
}

fn step(label: &str, log: &Log, fail: bool) -> BuildOp {
  BuildOp::custom(Step {
    label: label.to_string(),
    log: log.clone(),
    fail,
  })
}

/// A construct that declares its function and defers its own build.
fn function_with_build(ctx: &BuildContext, name: &str, log: &Log, fail: bool) {
  Resource::builder(name, "function").declare(ctx);
  ctx.defer_build(step(name, log, fail));
}

/// A construct that nests another construct before deferring its build.
fn service(ctx: &BuildContext, log: &Log, fail_nested: bool) {
  function_with_build(ctx, "op1", log, false);
  function_with_build(ctx, "op2", log, fail_nested);
  ctx.defer_build(step("op3", log, false));
}

fn env(temp: &TempDir) -> BuildEnv {
  BuildEnv::new(Platform::current().unwrap(), temp.path())
}

#[tokio::test]
async fn nested_declarations_run_in_order() {
  let temp = TempDir::new().unwrap();
  let log = Log::default();
  let ctx = context();
  service(&ctx, &log, false);

  let synthesis = ctx.synthesize().unwrap();
  assert!(log.lock().unwrap().is_empty(), "nothing runs during declaration");

  synthesis.pipeline.run(&env(&temp)).await.unwrap();
  assert_eq!(*log.lock().unwrap(), vec!["op1", "op2", "op3"]);
}

#[tokio::test]
async fn failing_step_stops_the_pipeline() {
  let temp = TempDir::new().unwrap();
  let log = Log::default();
  let ctx = context();
  service(&ctx, &log, true);

  let err = ctx.synthesize().unwrap().pipeline.run(&env(&temp)).await.unwrap_err();

  assert_eq!(err.index, 1);
  assert_eq!(err.name, "op2");
  assert_eq!(*log.lock().unwrap(), vec!["op1", "op2"]);
}

#[cfg(unix)]
#[tokio::test]
async fn exec_then_package_uses_earlier_artifacts() {
  use nimbus_lib::pipeline::actions::exec::ExecOpts;

  let temp = TempDir::new().unwrap();
  let ctx = context();
  ctx.defer_build(BuildOp::exec(
    ExecOpts::new("sh").args(["-c", "mkdir -p dist && printf ok > dist/bootstrap"]),
  ));
  ctx.defer_build(BuildOp::package("dist", "out/function.zip"));

  let report = ctx.synthesize().unwrap().pipeline.run(&env(&temp)).await.unwrap();

  assert_eq!(report.steps.len(), 2);
  assert!(temp.path().join("out/function.zip").is_file());
}

#[cfg(unix)]
#[tokio::test]
async fn process_failure_carries_stderr() {
  use nimbus_lib::pipeline::actions::exec::ExecOpts;

  let temp = TempDir::new().unwrap();
  let ctx = context();
  ctx.defer_build(BuildOp::exec(
    ExecOpts::new("sh").args(["-c", "echo 'error: linker not found' >&2; exit 101"]),
  ));
  ctx.defer_build(BuildOp::package("never", "never.zip"));

  let err = ctx.synthesize().unwrap().pipeline.run(&env(&temp)).await.unwrap_err();

  match err.source {
    BuildError::Process { code, stderr, .. } => {
      assert_eq!(code, Some(101));
      assert!(stderr.contains("linker not found"));
    }
    other => panic!("expected process error, got {other:?}"),
  }
  assert!(!temp.path().join("never.zip").exists());
}

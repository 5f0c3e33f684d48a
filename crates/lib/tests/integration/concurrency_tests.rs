//! Declarations from concurrent tasks.

use std::collections::HashSet;

use nimbus_lib::environment::EnvironmentShape;
use nimbus_lib::link::{Capability, Principal, RoleProvider};
use nimbus_lib::resource::Resource;

use super::common::context;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_declarations_are_all_captured() {
  let ctx = context();

  let tasks: Vec<_> = (0..16)
    .map(|task| {
      let ctx = ctx.clone();
      tokio::spawn(async move {
        for i in 0..10 {
          Resource::builder(&format!("task {task} node {i}"), "queue").declare(&ctx);
          tokio::task::yield_now().await;
        }
      })
    })
    .collect();
  for task in tasks {
    task.await.unwrap();
  }

  let resources = ctx.resources();
  assert_eq!(resources.len(), 160);
  let names: HashSet<_> = resources.iter().map(|r| r.physical_name().to_string()).collect();
  assert_eq!(names.len(), 160);

  let project = ctx.synthesize().unwrap().project;
  assert_eq!(project.resources.len(), 160);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_links_to_one_principal() {
  let ctx = context();
  let function = Resource::builder("api", "function").declare(&ctx);
  let principal = Principal::builder(&function)
    .environment(EnvironmentShape::KeyValue, "environment.variables")
    .declare(&ctx);
  let tables: Vec<_> = (0..8)
    .map(|i| Resource::builder(&format!("table {i}"), "table").declare(&ctx))
    .collect();

  let tasks: Vec<_> = tables
    .into_iter()
    .map(|table| {
      let ctx = ctx.clone();
      let principal = principal.clone();
      tokio::spawn(async move {
        let capability = Capability::of("table", &table)
          .action("dynamodb:GetItem")
          .target(table.attr("arn"))
          .expose("name", table.attr("name"));
        // Every task links twice; the second link must not add anything.
        principal.link(&ctx, &capability);
        tokio::task::yield_now().await;
        principal.link(&ctx, &capability);
      })
    })
    .collect();
  for task in tasks {
    task.await.unwrap();
  }

  assert_eq!(ctx.link_registry().len(), 8);
  assert_eq!(ctx.policy_of(&principal).unwrap().len(), 8);
  assert_eq!(ctx.environment_of(&principal).unwrap().len(), 8);
}

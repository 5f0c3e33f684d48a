//! Capability linking across declared nodes.

use nimbus_lib::link::{Capability, PolicyStatement, Principal, RoleProvider};
use nimbus_lib::output::Output;
use nimbus_lib::resource::Resource;

use super::common::{bucket_and_function, context, read_bucket};

#[test]
fn linking_a_bucket_to_a_function() {
  let ctx = context();
  let fixture = bucket_and_function(&ctx);

  fixture.principal.link(&ctx, &read_bucket(&fixture.bucket));

  assert_eq!(ctx.resources().len(), 2);

  let env = ctx.environment_of(&fixture.principal).unwrap();
  let name = env.get("STORE_MY_BUCKET_NAME").expect("bucket name should be bound");
  assert_eq!(name.root(), Some(fixture.bucket.physical_name()));
  assert_eq!(name, &fixture.bucket.attr("bucket"));

  let policy = ctx.policy_of(&fixture.principal).unwrap();
  let statements: Vec<&PolicyStatement> = policy.statements().collect();
  assert_eq!(statements.len(), 1);
  assert_eq!(statements[0].action, vec!["s3:GetObject", "s3:ListBucket"]);
  assert!(
    statements[0]
      .resource
      .iter()
      .all(|target| target.render().contains("${dev-my-bucket.arn}"))
  );
}

#[test]
fn linking_twice_is_idempotent() {
  let ctx = context();
  let fixture = bucket_and_function(&ctx);
  let capability = read_bucket(&fixture.bucket);

  fixture.principal.link(&ctx, &capability);
  let registry_before = ctx.link_registry().len();
  let env_before = ctx.environment_of(&fixture.principal).unwrap();

  fixture.principal.link(&ctx, &capability);

  assert_eq!(ctx.link_registry().len(), registry_before);
  assert_eq!(ctx.policy_of(&fixture.principal).unwrap().len(), 1);
  assert_eq!(ctx.environment_of(&fixture.principal).unwrap(), env_before);

  let project = ctx.synthesize().unwrap().project;
  let record = serde_json::to_value(&project.resources["dev-my-function"]).unwrap();
  assert_eq!(record["properties"]["role"]["policy"]["Statement"].as_array().unwrap().len(), 1);
  assert_eq!(record["properties"]["environment"].as_array().unwrap().len(), 1);
}

#[test]
fn relinking_replaces_the_earlier_grant() {
  let ctx = context();
  let fixture = bucket_and_function(&ctx);

  fixture.principal.link(&ctx, &read_bucket(&fixture.bucket));
  let write = Capability::of("store", &fixture.bucket)
    .action("s3:PutObject")
    .target(fixture.bucket.attr("arn"))
    .expose("name", fixture.bucket.attr("bucket"));
  fixture.principal.link(&ctx, &write);

  let policy = ctx.policy_of(&fixture.principal).unwrap();
  let actions: Vec<_> = policy.statements().flat_map(|s| s.action.clone()).collect();
  assert_eq!(actions, vec!["s3:PutObject"]);
}

#[test]
fn relinking_drops_environment_entries_no_longer_exposed() {
  let ctx = context();
  let fixture = bucket_and_function(&ctx);

  let both = Capability::of("store", &fixture.bucket)
    .action("s3:GetObject")
    .target(fixture.bucket.attr("arn"))
    .expose("name", fixture.bucket.attr("bucket"))
    .expose("arn", fixture.bucket.attr("arn"));
  fixture.principal.link(&ctx, &both);
  assert_eq!(ctx.environment_of(&fixture.principal).unwrap().len(), 2);

  fixture.principal.link(&ctx, &read_bucket(&fixture.bucket));

  let env = ctx.environment_of(&fixture.principal).unwrap();
  let keys: Vec<_> = env.iter().map(|(k, _)| k.to_string()).collect();
  assert_eq!(keys, vec!["STORE_MY_BUCKET_NAME"]);

  let registry = ctx.link_registry();
  let exposed: Vec<_> = registry[0].properties.keys().cloned().collect();
  assert_eq!(exposed, vec!["name"]);
}

#[test]
fn relinking_without_actions_revokes_the_statement() {
  let ctx = context();
  let fixture = bucket_and_function(&ctx);

  fixture.principal.link(&ctx, &read_bucket(&fixture.bucket));
  let expose_only = Capability::of("store", &fixture.bucket).expose("name", fixture.bucket.attr("bucket"));
  fixture.principal.link(&ctx, &expose_only);

  assert!(ctx.policy_of(&fixture.principal).unwrap().is_empty());
  assert_eq!(ctx.environment_of(&fixture.principal).unwrap().len(), 1);
}

#[test]
fn one_capability_many_principals() {
  let ctx = context();
  let fixture = bucket_and_function(&ctx);
  let worker = Resource::builder("worker", "function").declare(&ctx);
  let worker = Principal::builder(&worker).declare(&ctx);

  let capability = read_bucket(&fixture.bucket);
  fixture.principal.link(&ctx, &capability);
  worker.link(&ctx, &capability);

  assert_eq!(ctx.link_registry().len(), 1);
  assert_eq!(ctx.policy_of(&fixture.principal).unwrap().len(), 1);
  assert_eq!(ctx.policy_of(&worker).unwrap().len(), 1);
}

#[test]
fn environment_renders_in_the_principal_shape() {
  let ctx = context();
  let fixture = bucket_and_function(&ctx);
  fixture.principal.link(&ctx, &read_bucket(&fixture.bucket));

  let project = ctx.synthesize().unwrap().project;
  let record = serde_json::to_value(&project.resources["dev-my-function"]).unwrap();
  assert_eq!(
    record["properties"]["environment"],
    serde_json::json!([{ "name": "STORE_MY_BUCKET_NAME", "value": "${dev-my-bucket.bucket}" }])
  );
  assert_eq!(record["properties"]["handler"], "bootstrap");
}

#[test]
fn linked_function_depends_on_its_capabilities() {
  let ctx = context();
  let fixture = bucket_and_function(&ctx);
  fixture.principal.link(&ctx, &read_bucket(&fixture.bucket));

  let synthesis = ctx.synthesize().unwrap();
  assert_eq!(
    synthesis.graph.dependencies_of(fixture.function.physical_name()),
    vec![fixture.bucket.physical_name()]
  );
}

#[test]
fn capabilities_may_expose_literals() {
  let ctx = context();
  let fixture = bucket_and_function(&ctx);
  fixture.principal.link(
    &ctx,
    &Capability::new("config", "feature flags").expose("mode", Output::literal("canary")),
  );

  let env = ctx.environment_of(&fixture.principal).unwrap();
  assert_eq!(env.get("CONFIG_FEATURE_FLAGS_MODE"), Some(&Output::literal("canary")));
  assert!(ctx.policy_of(&fixture.principal).unwrap().is_empty());
}

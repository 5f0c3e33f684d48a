//! Physical name generation through declared nodes.

use std::collections::HashSet;

use nimbus_lib::consts::DEFAULT_MAX_LENGTH;
use nimbus_lib::naming::{physical_name, tokenize};
use nimbus_lib::resource::Resource;

use super::common::context;

const LONG_PREFIX: &str = "customer order fulfillment pipeline dead letter queue for region";

#[test]
fn sixty_colliding_long_names_stay_distinct() {
  let ctx = context();
  let names: Vec<String> = (0..60)
    .map(|i| {
      Resource::builder(&format!("{LONG_PREFIX} {i}"), "queue")
        .declare(&ctx)
        .physical_name()
        .to_string()
    })
    .collect();

  let unique: HashSet<&String> = names.iter().collect();
  assert_eq!(unique.len(), 60);
  assert!(names.iter().all(|n| n.len() <= DEFAULT_MAX_LENGTH));

  let prefix = &names[0][..DEFAULT_MAX_LENGTH - 5];
  assert!(names.iter().all(|n| n.starts_with(prefix)), "all names share the truncated prefix");
}

#[test]
fn names_are_stable_across_invocations() {
  let first = Resource::builder(LONG_PREFIX, "queue").declare(&context());
  let second = Resource::builder(LONG_PREFIX, "queue").declare(&context());
  assert_eq!(first.physical_name(), second.physical_name());
  assert_eq!(first.physical_name(), physical_name("dev", LONG_PREFIX, DEFAULT_MAX_LENGTH));
}

#[test]
fn tokenize_is_idempotent_on_physical_names() {
  for name in ["My Bucket", LONG_PREFIX, "HTTPServer", "a--b__c", "x"] {
    let once = physical_name("dev", name, DEFAULT_MAX_LENGTH);
    assert_eq!(tokenize(&[once.as_str()], '-', DEFAULT_MAX_LENGTH), once);
  }
}

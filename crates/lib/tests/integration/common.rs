//! Shared fixtures for integration tests.

use nimbus_lib::context::BuildContext;
use nimbus_lib::environment::EnvironmentShape;
use nimbus_lib::link::{Capability, Principal};
use nimbus_lib::resource::{Resource, ResourceRef};

pub const STAGE: &str = "dev";

pub fn context() -> BuildContext {
  BuildContext::new("shop", STAGE)
}

/// A storage node A and a function node B whose identity can link.
pub struct BucketAndFunction {
  pub bucket: ResourceRef,
  pub function: ResourceRef,
  pub principal: Principal,
}

pub fn bucket_and_function(ctx: &BuildContext) -> BucketAndFunction {
  let bucket = Resource::builder("My Bucket", "store").declare(ctx);
  let function = Resource::builder("My Function", "function")
    .property("handler", "bootstrap")
    .declare(ctx);
  let principal = Principal::builder(&function)
    .policy_property("role.policy")
    .environment(EnvironmentShape::NameValueList, "environment")
    .declare(ctx);

  BucketAndFunction {
    bucket,
    function,
    principal,
  }
}

/// Read and list access to a bucket, exposing its name.
pub fn read_bucket(bucket: &ResourceRef) -> Capability {
  Capability::of("store", bucket)
    .actions(["s3:GetObject", "s3:ListBucket"])
    .target(bucket.attr("arn"))
    .target(nimbus_lib::interpolate!("{}/*", bucket.attr("arn")))
    .expose("name", bucket.attr("bucket"))
}

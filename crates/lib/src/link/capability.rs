//! The stock [`Linkable`] implementation.

use std::collections::BTreeMap;

use super::{Link, LinkProperties, Linkable};
use crate::output::Output;
use crate::resource::ResourceRef;

/// A capability exposed by one declared node.
///
/// ```
/// use nimbus_lib::context::BuildContext;
/// use nimbus_lib::link::{Capability, Linkable};
/// use nimbus_lib::resource::Resource;
///
/// let ctx = BuildContext::new("shop", "dev");
/// let bucket = Resource::builder("assets", "aws:s3:Bucket").declare(&ctx);
/// let read = Capability::of("store", &bucket)
///   .actions(["s3:GetObject", "s3:ListBucket"])
///   .target(bucket.attr("arn"))
///   .expose("name", bucket.attr("bucket"));
///
/// let link = read.link();
/// assert_eq!(link.capability_name, "assets");
/// assert_eq!(link.actions, vec!["s3:GetObject", "s3:ListBucket"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
  kind: String,
  name: String,
  actions: Vec<String>,
  targets: Vec<Output>,
  exposed: BTreeMap<String, Output>,
}

impl Capability {
  pub fn new(kind: &str, name: &str) -> Self {
    Self {
      kind: kind.to_string(),
      name: name.to_string(),
      actions: Vec::new(),
      targets: Vec::new(),
      exposed: BTreeMap::new(),
    }
  }

  /// A capability named after the node's chosen name.
  pub fn of(kind: &str, node: &ResourceRef) -> Self {
    Self::new(kind, node.name())
  }

  pub fn action(mut self, action: &str) -> Self {
    if !self.actions.iter().any(|a| a == action) {
      self.actions.push(action.to_string());
    }
    self
  }

  pub fn actions<'a>(self, actions: impl IntoIterator<Item = &'a str>) -> Self {
    actions.into_iter().fold(self, Self::action)
  }

  /// A reference the granted actions apply to.
  pub fn target(mut self, target: impl Into<Output>) -> Self {
    let target = target.into();
    if !self.targets.contains(&target) {
      self.targets.push(target);
    }
    self
  }

  /// Expose `value` to linking principals under `key`.
  pub fn expose(mut self, key: &str, value: impl Into<Output>) -> Self {
    self.exposed.insert(key.to_string(), value.into());
    self
  }
}

impl Linkable for Capability {
  fn link(&self) -> Link {
    let properties = (!self.exposed.is_empty()).then(|| LinkProperties {
      capability_type: self.kind.clone(),
      capability_name: self.name.clone(),
      properties: self.exposed.clone(),
    });

    Link {
      capability_type: self.kind.clone(),
      capability_name: self.name.clone(),
      actions: self.actions.clone(),
      resources: self.targets.clone(),
      properties,
    }
  }
}

//! Declarative nodes.
//!
//! A [`Resource`] describes one provisioned object: a type tag understood by
//! the provisioning engine, a property bag of literals and [`Output`]s, and a
//! handful of per-node options. Nodes are immutable once declared.
//!
//! Nodes enter the graph only through [`ResourceBuilder::declare`], which
//! computes the physical name from the context's stage and registers the node
//! in one step:
//!
//! ```
//! use nimbus_lib::context::BuildContext;
//! use nimbus_lib::resource::Resource;
//!
//! let ctx = BuildContext::new("shop", "prod");
//! let bucket = Resource::builder("Static Assets", "aws:s3:Bucket")
//!   .property("forceDestroy", true)
//!   .declare(&ctx);
//!
//! assert_eq!(bucket.physical_name(), "prod-static-assets");
//! assert_eq!(bucket.attr("arn").to_string(), "${prod-static-assets.arn}");
//! ```

use std::collections::BTreeMap;

use crate::consts::DEFAULT_MAX_LENGTH;
use crate::context::BuildContext;
use crate::naming::physical_name;
use crate::output::Output;
use crate::value::Value;

/// Per-node options forwarded to the provisioning engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceOptions {
  /// Refuse deletion of the provisioned object.
  pub protect: Option<bool>,
  /// Alternate provider binding.
  pub provider: Option<ResourceRef>,
}

impl ResourceOptions {
  pub fn is_empty(&self) -> bool {
    self.protect.is_none() && self.provider.is_none()
  }
}

/// An immutable description of one infrastructure object.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
  name: String,
  physical_name: String,
  type_tag: String,
  properties: BTreeMap<String, Value>,
  depends_on: Vec<ResourceRef>,
  options: ResourceOptions,
  existing: Option<String>,
}

impl Resource {
  pub fn builder(name: &str, type_tag: &str) -> ResourceBuilder {
    ResourceBuilder::new(name, type_tag)
  }

  /// The name chosen in declaration code.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// The provider-facing name derived from stage and chosen name.
  pub fn physical_name(&self) -> &str {
    &self.physical_name
  }

  pub fn type_tag(&self) -> &str {
    &self.type_tag
  }

  pub fn properties(&self) -> &BTreeMap<String, Value> {
    &self.properties
  }

  pub fn depends_on(&self) -> &[ResourceRef] {
    &self.depends_on
  }

  pub fn options(&self) -> &ResourceOptions {
    &self.options
  }

  /// Provider id of an existing object this node adopts instead of creating.
  pub fn existing(&self) -> Option<&str> {
    self.existing.as_deref()
  }

  pub fn to_ref(&self) -> ResourceRef {
    ResourceRef {
      name: self.name.clone(),
      physical_name: self.physical_name.clone(),
      type_tag: self.type_tag.clone(),
    }
  }
}

/// A lightweight handle to a declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
  name: String,
  physical_name: String,
  type_tag: String,
}

impl ResourceRef {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn physical_name(&self) -> &str {
    &self.physical_name
  }

  pub fn type_tag(&self) -> &str {
    &self.type_tag
  }

  /// A reference to the whole node.
  pub fn output(&self) -> Output {
    Output::reference(&self.physical_name)
  }

  /// A reference to one attribute of the node, e.g. `arn`.
  pub fn attr(&self, name: &str) -> Output {
    self.output().field(name)
  }
}

/// Collects a resource's definition; [`declare`](Self::declare) registers it.
#[derive(Debug, Clone)]
#[must_use = "a resource is only part of the graph once declared"]
pub struct ResourceBuilder {
  name: String,
  type_tag: String,
  properties: BTreeMap<String, Value>,
  depends_on: Vec<ResourceRef>,
  options: ResourceOptions,
  existing: Option<String>,
  max_length: usize,
}

impl ResourceBuilder {
  fn new(name: &str, type_tag: &str) -> Self {
    Self {
      name: name.to_string(),
      type_tag: type_tag.to_string(),
      properties: BTreeMap::new(),
      depends_on: Vec::new(),
      options: ResourceOptions::default(),
      existing: None,
      max_length: DEFAULT_MAX_LENGTH,
    }
  }

  pub fn property(mut self, key: &str, value: impl Into<Value>) -> Self {
    self.properties.insert(key.to_string(), value.into());
    self
  }

  pub fn properties<K, V>(mut self, entries: impl IntoIterator<Item = (K, V)>) -> Self
  where
    K: Into<String>,
    V: Into<Value>,
  {
    self
      .properties
      .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
    self
  }

  /// Explicit ordering dependency, in addition to those implied by references.
  pub fn depends_on(mut self, node: &ResourceRef) -> Self {
    if !self.depends_on.contains(node) {
      self.depends_on.push(node.clone());
    }
    self
  }

  pub fn protect(mut self, protect: bool) -> Self {
    self.options.protect = Some(protect);
    self
  }

  pub fn provider(mut self, provider: &ResourceRef) -> Self {
    self.options.provider = Some(provider.clone());
    self
  }

  /// Adopt the existing object with provider id `id` instead of creating one.
  pub fn existing(mut self, id: &str) -> Self {
    self.existing = Some(id.to_string());
    self
  }

  /// Provider-specific bound on the physical name.
  pub fn max_length(mut self, max_length: usize) -> Self {
    self.max_length = max_length;
    self
  }

  /// Compute the physical name and register the node with `ctx`.
  ///
  /// # Panics
  ///
  /// Panics if `ctx` is sealed or already holds a node with the same physical
  /// name.
  pub fn declare(self, ctx: &BuildContext) -> ResourceRef {
    let resource = Resource {
      physical_name: physical_name(ctx.stage(), &self.name, self.max_length),
      name: self.name,
      type_tag: self.type_tag,
      properties: self.properties,
      depends_on: self.depends_on,
      options: self.options,
      existing: self.existing,
    };
    assert!(
      !resource.physical_name.is_empty(),
      "resource `{}` in stage `{}` has an empty physical name",
      resource.name,
      ctx.stage()
    );
    ctx.track_resource(resource)
  }
}

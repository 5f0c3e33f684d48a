//! Capability linking.
//!
//! A node that others may use advertises a [`Link`]: the actions a consumer
//! needs, the references those actions apply to, and optionally a set of
//! [`LinkProperties`] the consumer should see at runtime. A [`Principal`]
//! (a node that owns an identity) links the capability, which
//!
//! 1. grants a least-privilege statement in the principal's [`PolicyDocument`],
//! 2. merges the exposed properties into the principal's environment, if it
//!    has one,
//! 3. records the properties in the context's link registry.
//!
//! Every step is keyed by `(capability_type, capability_name)`, so linking the
//! same capability again replaces the earlier grant instead of duplicating it.

mod capability;
mod policy;
mod principal;

pub use capability::Capability;
pub use policy::{Effect, PolicyDocument, PolicyStatement};
pub use principal::{Principal, PrincipalBuilder, RoleProvider};

pub(crate) use principal::PrincipalState;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::naming::env_key;
use crate::output::Output;

/// Identity of a capability within one build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkKey {
  pub capability_type: String,
  pub capability_name: String,
}

impl LinkKey {
  pub fn new(capability_type: &str, capability_name: &str) -> Self {
    Self {
      capability_type: capability_type.to_string(),
      capability_name: capability_name.to_string(),
    }
  }
}

impl fmt::Display for LinkKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.capability_type, self.capability_name)
  }
}

/// Named values a capability exposes to whoever links it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkProperties {
  pub capability_type: String,
  pub capability_name: String,
  pub properties: BTreeMap<String, Output>,
}

impl LinkProperties {
  pub fn new(capability_type: &str, capability_name: &str) -> Self {
    Self {
      capability_type: capability_type.to_string(),
      capability_name: capability_name.to_string(),
      properties: BTreeMap::new(),
    }
  }

  pub fn with(mut self, key: &str, value: impl Into<Output>) -> Self {
    self.properties.insert(key.to_string(), value.into());
    self
  }

  pub fn key(&self) -> LinkKey {
    LinkKey::new(&self.capability_type, &self.capability_name)
  }

  /// Environment variable under which `property` is exposed.
  ///
  /// ```
  /// use nimbus_lib::link::LinkProperties;
  ///
  /// let props = LinkProperties::new("store", "My Bucket");
  /// assert_eq!(props.env_key("name"), "STORE_MY_BUCKET_NAME");
  /// ```
  pub fn env_key(&self, property: &str) -> String {
    env_key(&[self.capability_type.as_str(), self.capability_name.as_str(), property])
  }

  /// Every property paired with its environment variable key.
  pub fn environment(&self) -> Vec<(String, Output)> {
    self
      .properties
      .iter()
      .map(|(key, value)| (self.env_key(key), value.clone()))
      .collect()
  }
}

/// What a capability requires from, and offers to, a principal.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
  pub capability_type: String,
  pub capability_name: String,
  pub actions: Vec<String>,
  pub resources: Vec<Output>,
  pub properties: Option<LinkProperties>,
}

impl Link {
  pub fn key(&self) -> LinkKey {
    LinkKey::new(&self.capability_type, &self.capability_name)
  }

  /// The properties to register, empty when the capability exposes none.
  pub fn registry_entry(&self) -> LinkProperties {
    self
      .properties
      .clone()
      .unwrap_or_else(|| LinkProperties::new(&self.capability_type, &self.capability_name))
  }
}

/// Anything a principal can link.
pub trait Linkable {
  fn link(&self) -> Link;
}

impl Linkable for Link {
  fn link(&self) -> Link {
    self.clone()
  }
}

//! Permission documents attached to principals.

use indexmap::IndexMap;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::{Link, LinkKey};
use crate::consts::POLICY_VERSION;
use crate::output::Output;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
  Allow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
  pub effect: Effect,
  pub action: Vec<String>,
  pub resource: Vec<Output>,
}

impl PolicyStatement {
  pub fn allow(action: Vec<String>, resource: Vec<Output>) -> Self {
    Self {
      effect: Effect::Allow,
      action,
      resource,
    }
  }

  /// The grant a link requires, or `None` if it needs no permissions.
  pub fn from_link(link: &Link) -> Option<Self> {
    if link.actions.is_empty() || link.resources.is_empty() {
      return None;
    }
    Some(Self::allow(link.actions.clone(), link.resources.clone()))
  }

  pub fn to_value(&self) -> Value {
    Value::map([
      ("Effect", Value::from("Allow")),
      ("Action", Value::array(self.action.iter().map(String::as_str))),
      ("Resource", Value::array(self.resource.iter())),
    ])
  }
}

/// A principal's statements, one per linked capability.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyDocument {
  statements: IndexMap<LinkKey, PolicyStatement>,
}

impl PolicyDocument {
  pub fn new() -> Self {
    Self::default()
  }

  /// Grant `statement` for `key`, returning the statement it replaced.
  pub fn grant(&mut self, key: LinkKey, statement: PolicyStatement) -> Option<PolicyStatement> {
    self.statements.insert(key, statement)
  }

  /// Drop the statement for `key`, keeping the order of the rest.
  pub fn revoke(&mut self, key: &LinkKey) -> Option<PolicyStatement> {
    self.statements.shift_remove(key)
  }

  pub fn get(&self, key: &LinkKey) -> Option<&PolicyStatement> {
    self.statements.get(key)
  }

  pub fn len(&self) -> usize {
    self.statements.len()
  }

  pub fn is_empty(&self) -> bool {
    self.statements.is_empty()
  }

  pub fn statements(&self) -> impl Iterator<Item = &PolicyStatement> {
    self.statements.values()
  }

  pub fn to_value(&self) -> Value {
    Value::map([
      ("Version", Value::from(POLICY_VERSION)),
      ("Statement", Value::array(self.statements().map(PolicyStatement::to_value))),
    ])
  }
}

impl Serialize for PolicyDocument {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let statements: Vec<_> = self.statements().collect();
    let mut doc = serializer.serialize_struct("PolicyDocument", 2)?;
    doc.serialize_field("Version", POLICY_VERSION)?;
    doc.serialize_field("Statement", &statements)?;
    doc.end()
  }
}

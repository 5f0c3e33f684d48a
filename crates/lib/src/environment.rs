//! Runtime environment bags for compute nodes.
//!
//! An [`Environment`] holds symbolic string values under normalized
//! upper-snake keys. The owning node picks one [`EnvironmentShape`] when it is
//! declared; the shape only affects how the bag is written into the node's
//! properties.

use indexmap::IndexMap;

use crate::naming::env_key;
use crate::output::Output;
use crate::value::Value;

/// How an environment bag is rendered into a node's properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvironmentShape {
  /// `{ "KEY": "value" }`
  #[default]
  KeyValue,
  /// `[{ "name": "KEY", "value": "value" }]`
  NameValueList,
  /// `[{ "key": "KEY", "value": "value" }]`
  KeyValueList,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Environment {
  shape: EnvironmentShape,
  entries: IndexMap<String, Output>,
}

impl Environment {
  pub fn new(shape: EnvironmentShape) -> Self {
    Self {
      shape,
      entries: IndexMap::new(),
    }
  }

  /// Normalize a key; normalizing twice is a no-op.
  pub fn to_key(key: &str) -> String {
    env_key(&[key])
  }

  pub fn shape(&self) -> EnvironmentShape {
    self.shape
  }

  /// Insert under the normalized key, returning the replaced value.
  pub fn insert(&mut self, key: &str, value: impl Into<Output>) -> Option<Output> {
    self.entries.insert(Self::to_key(key), value.into())
  }

  /// Insert or overwrite every entry.
  pub fn merge<K, V>(&mut self, entries: impl IntoIterator<Item = (K, V)>)
  where
    K: AsRef<str>,
    V: Into<Output>,
  {
    for (key, value) in entries {
      self.insert(key.as_ref(), value);
    }
  }

  /// Remove the entry under the normalized key, keeping the order of the rest.
  pub fn remove(&mut self, key: &str) -> Option<Output> {
    self.entries.shift_remove(&Self::to_key(key))
  }

  pub fn get(&self, key: &str) -> Option<&Output> {
    self.entries.get(&Self::to_key(key))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Output)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v))
  }

  /// Render the bag in its shape.
  pub fn to_value(&self) -> Value {
    match self.shape {
      EnvironmentShape::KeyValue => Value::map(self.iter().map(|(k, v)| (k, v.clone()))),
      EnvironmentShape::NameValueList => self.entry_list("name"),
      EnvironmentShape::KeyValueList => self.entry_list("key"),
    }
  }

  fn entry_list(&self, key_field: &str) -> Value {
    Value::array(
      self
        .iter()
        .map(|(k, v)| Value::map([(key_field, Value::from(k)), ("value", Value::from(v))])),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample(shape: EnvironmentShape) -> Environment {
    let mut env = Environment::new(shape);
    env.merge([
      ("queueUrl", Output::reference("dev-jobs").field("url")),
      ("log level", Output::literal("debug")),
    ]);
    env
  }

  #[test]
  fn keys_are_normalized() {
    let env = sample(EnvironmentShape::KeyValue);
    let keys: Vec<_> = env.iter().map(|(k, _)| k.to_string()).collect();
    assert_eq!(keys, vec!["QUEUE_URL", "LOG_LEVEL"]);
    assert_eq!(env.get("queue_url"), env.get("QUEUE_URL"));
  }

  #[test]
  fn to_key_is_a_fixed_point() {
    for raw in ["queueUrl", "LOG_LEVEL", "db host", "aB1cD", "--x--", ""] {
      let once = Environment::to_key(raw);
      assert_eq!(Environment::to_key(&once), once);
    }
  }

  #[test]
  fn merge_overwrites_existing_entries() {
    let mut env = sample(EnvironmentShape::KeyValue);
    let replaced = env.insert("LOG_LEVEL", "info");
    assert_eq!(replaced, Some(Output::literal("debug")));
    assert_eq!(env.len(), 2);
    assert_eq!(env.get("logLevel"), Some(&Output::literal("info")));
  }

  #[test]
  fn remove_normalizes_and_keeps_order() {
    let mut env = sample(EnvironmentShape::KeyValue);
    env.insert("region", "eu-west-1");

    assert_eq!(env.remove("queueUrl"), Some(Output::reference("dev-jobs").field("url")));
    assert!(env.remove("QUEUE_URL").is_none());
    let keys: Vec<_> = env.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["LOG_LEVEL", "REGION"]);
  }

  #[test]
  fn renders_key_value_map() {
    let value = sample(EnvironmentShape::KeyValue).to_value();
    assert_eq!(
      serde_json::to_value(&value).unwrap(),
      serde_json::json!({ "QUEUE_URL": "${dev-jobs.url}", "LOG_LEVEL": "debug" })
    );
  }

  #[test]
  fn renders_name_value_list_in_insertion_order() {
    let value = sample(EnvironmentShape::NameValueList).to_value();
    assert_eq!(
      serde_json::to_value(&value).unwrap(),
      serde_json::json!([
        { "name": "QUEUE_URL", "value": "${dev-jobs.url}" },
        { "name": "LOG_LEVEL", "value": "debug" },
      ])
    );
  }

  #[test]
  fn renders_key_value_list() {
    let value = sample(EnvironmentShape::KeyValueList).to_value();
    assert_eq!(
      serde_json::to_value(&value).unwrap(),
      serde_json::json!([
        { "key": "QUEUE_URL", "value": "${dev-jobs.url}" },
        { "key": "LOG_LEVEL", "value": "debug" },
      ])
    );
  }
}

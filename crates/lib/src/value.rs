//! Property values for declarative nodes.
//!
//! A [`Value`] is a JSON-like tree whose leaves may be [`Output`]s. Outputs
//! serialize as their rendered `${...}` text, so a serialized value is exactly
//! what the provisioning engine reads.
//!
//! # Example
//!
//! ```
//! use nimbus_lib::output::Output;
//! use nimbus_lib::value::Value;
//!
//! let value = Value::map([
//!   ("bucket", Value::from(Output::reference("dev-assets").field("bucket"))),
//!   ("versioned", Value::from(true)),
//! ]);
//! assert_eq!(
//!   serde_json::to_string(&value).unwrap(),
//!   r#"{"bucket":"${dev-assets.bucket}","versioned":true}"#
//! );
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Serialize, Serializer};

use crate::output::{self, Output, OutputError};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Number(serde_json::Number),
  String(String),
  Output(Output),
  Array(Vec<Value>),
  Map(BTreeMap<String, Value>),
}

impl Value {
  pub fn map<K: Into<String>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
    Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }

  pub fn array<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
    Value::Array(items.into_iter().map(Into::into).collect())
  }

  pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
    match self {
      Value::Map(map) => Some(map),
      _ => None,
    }
  }

  /// Physical names of every node this value refers to.
  ///
  /// Includes references embedded in plain strings and interpolated literals.
  pub fn references(&self) -> Result<BTreeSet<String>, OutputError> {
    let mut roots = BTreeSet::new();
    self.collect_references(&mut roots)?;
    Ok(roots)
  }

  fn collect_references(&self, roots: &mut BTreeSet<String>) -> Result<(), OutputError> {
    match self {
      Value::Null | Value::Bool(_) | Value::Number(_) => {}
      Value::String(text) => collect_from_text(text, roots)?,
      Value::Output(out) => match out.root() {
        Some(root) => {
          roots.insert(root.to_string());
          collect_from_text(out.prefix(), roots)?;
        }
        None => collect_from_text(out.prefix(), roots)?,
      },
      Value::Array(items) => {
        for item in items {
          item.collect_references(roots)?;
        }
      }
      Value::Map(map) => {
        for item in map.values() {
          item.collect_references(roots)?;
        }
      }
    }
    Ok(())
  }

  /// Set `value` at a dotted `path` (e.g. `environment.variables`), creating
  /// intermediate maps and replacing non-map intermediates.
  pub fn set_path(&mut self, path: &str, value: Value) {
    let mut current = self;
    let mut keys = path.split('.').peekable();
    while let Some(key) = keys.next() {
      if !matches!(current, Value::Map(_)) {
        *current = Value::Map(BTreeMap::new());
      }
      let Value::Map(map) = current else {
        unreachable!("current was just made a map");
      };
      if keys.peek().is_none() {
        map.insert(key.to_string(), value);
        return;
      }
      current = map.entry(key.to_string()).or_default();
    }
  }
}

fn collect_from_text(text: &str, roots: &mut BTreeSet<String>) -> Result<(), OutputError> {
  if !text.contains("${") {
    return Ok(());
  }
  for reference in output::references(text)? {
    if let Some(root) = reference.root() {
      roots.insert(root.to_string());
    }
  }
  Ok(())
}

impl Serialize for Value {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Value::Null => serializer.serialize_unit(),
      Value::Bool(b) => serializer.serialize_bool(*b),
      Value::Number(n) => n.serialize(serializer),
      Value::String(s) => serializer.serialize_str(s),
      Value::Output(out) => out.serialize(serializer),
      Value::Array(items) => items.serialize(serializer),
      Value::Map(map) => map.serialize(serializer),
    }
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::String(s)
  }
}

impl From<Output> for Value {
  fn from(out: Output) -> Self {
    Value::Output(out)
  }
}

impl From<&Output> for Value {
  fn from(out: &Output) -> Self {
    Value::Output(out.clone())
  }
}

impl From<Vec<Value>> for Value {
  fn from(items: Vec<Value>) -> Self {
    Value::Array(items)
  }
}

impl From<BTreeMap<String, Value>> for Value {
  fn from(map: BTreeMap<String, Value>) -> Self {
    Value::Map(map)
  }
}

impl From<f64> for Value {
  fn from(n: f64) -> Self {
    serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
  }
}

macro_rules! number_from_int {
  ($($ty:ty),*) => {
    $(
      impl From<$ty> for Value {
        fn from(n: $ty) -> Self {
          Value::Number(n.into())
        }
      }
    )*
  };
}

number_from_int!(i32, i64, u16, u32, u64, usize);

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(value: Option<T>) -> Self {
    value.map(Into::into).unwrap_or(Value::Null)
  }
}

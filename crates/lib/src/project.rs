//! Translation of a sealed store into the provisioning engine's project
//! description.
//!
//! The project is a plain serializable value: named resource records, named
//! variable expressions, and named outputs, all keyed by physical name and
//! kept in declaration order so repeated runs emit identical files.
//!
//! # Example
//!
//! ```yaml
//! name: shop
//! resources:
//!   dev-assets:
//!     type: aws:s3:Bucket
//!   dev-api:
//!     type: aws:lambda:Function
//!     properties:
//!       environment:
//!         variables:
//!           STORE_ASSETS_NAME: ${dev-assets.bucket}
//!     options:
//!       dependsOn:
//!         - ${dev-assets}
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::context::Store;
use crate::graph::DependencyGraph;
use crate::link::PrincipalState;
use crate::output::{Output, OutputError};
use crate::pipeline::Pipeline;
use crate::resource::Resource;
use crate::util::hash::Hashable;
use crate::value::Value;

#[derive(Debug, Error)]
pub enum SynthError {
  #[error("invalid reference in `{node}`: {source}")]
  Reference {
    node: String,
    #[source]
    source: OutputError,
  },

  #[error("dependency cycle involving `{node}`")]
  Cycle { node: String },

  #[error("json serialization failed: {0}")]
  Json(#[from] serde_json::Error),

  #[error("yaml serialization failed: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Per-record engine options.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOptions {
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub depends_on: Vec<Output>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub protect: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub provider: Option<Output>,
}

impl RecordOptions {
  pub fn is_empty(&self) -> bool {
    self.depends_on.is_empty() && self.protect.is_none() && self.provider.is_none()
  }
}

/// Lookup of an existing object by provider id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingRecord {
  pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRecord {
  #[serde(rename = "type")]
  pub type_tag: String,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub properties: BTreeMap<String, Value>,
  #[serde(skip_serializing_if = "RecordOptions::is_empty")]
  pub options: RecordOptions,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub get: Option<ExistingRecord>,
}

impl ResourceRecord {
  fn new(resource: &Resource, principal: Option<&PrincipalState>) -> Self {
    let mut properties = resource.properties().clone();

    if let Some(state) = principal {
      if !state.policy.is_empty() {
        set_property(&mut properties, state.principal.policy_path(), state.policy.to_value());
      }
      if let (Some(env), Some(path)) = (&state.environment, state.principal.environment_path())
        && !env.is_empty()
      {
        set_property(&mut properties, path, env.to_value());
      }
    }

    let options = resource.options();
    Self {
      type_tag: resource.type_tag().to_string(),
      properties,
      options: RecordOptions {
        depends_on: resource.depends_on().iter().map(|node| node.output()).collect(),
        protect: options.protect,
        provider: options.provider.as_ref().map(|node| node.output()),
      },
      get: resource.existing().map(|id| ExistingRecord { id: id.to_string() }),
    }
  }

  /// Physical names of every node this record refers to.
  pub fn references(&self) -> Result<BTreeSet<String>, OutputError> {
    let mut roots = BTreeSet::new();
    for value in self.properties.values() {
      roots.extend(value.references()?);
    }
    let options = self.options.depends_on.iter().chain(self.options.provider.as_ref());
    roots.extend(options.filter_map(|out| out.root().map(str::to_string)));
    Ok(roots)
  }
}

/// Write `value` at the dotted `path` of a property bag.
fn set_property(properties: &mut BTreeMap<String, Value>, path: &str, value: Value) {
  match path.split_once('.') {
    Some((head, rest)) => properties.entry(head.to_string()).or_default().set_path(rest, value),
    None => {
      properties.insert(path.to_string(), value);
    }
  }
}

/// The engine-facing description of one build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
  pub name: String,
  #[serde(skip_serializing_if = "IndexMap::is_empty")]
  pub resources: IndexMap<String, ResourceRecord>,
  #[serde(skip_serializing_if = "IndexMap::is_empty")]
  pub variables: IndexMap<String, Value>,
  #[serde(skip_serializing_if = "IndexMap::is_empty")]
  pub outputs: IndexMap<String, Value>,
}

impl Hashable for Project {}

impl Project {
  pub(crate) fn from_store(name: &str, store: &Store) -> Self {
    let resources = store
      .resources
      .iter()
      .map(|resource| {
        let principal = store.principals.get(resource.physical_name());
        (resource.physical_name().to_string(), ResourceRecord::new(resource, principal))
      })
      .collect();

    let variables = store
      .variables
      .iter()
      .map(|variable| (variable.physical_name().to_string(), variable.definition().clone()))
      .collect();

    Self {
      name: name.to_string(),
      resources,
      variables,
      outputs: store.outputs.clone(),
    }
  }

  pub fn to_json(&self) -> Result<String, SynthError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn to_yaml(&self) -> Result<String, SynthError> {
    Ok(serde_yaml::to_string(self)?)
  }

  /// Write the project into `dir`, returning the file path.
  pub fn write(&self, dir: &Path, format: ProjectFormat) -> Result<PathBuf, SynthError> {
    let text = match format {
      ProjectFormat::Yaml => self.to_yaml()?,
      ProjectFormat::Json => self.to_json()?,
    };

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format.file_name());
    std::fs::write(&path, text)?;

    let hash = self.compute_hash()?;
    info!(path = ?path, hash = %hash, resources = self.resources.len(), "project written");
    Ok(path)
  }
}

/// Serialization format of the written project file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectFormat {
  #[default]
  Yaml,
  Json,
}

impl ProjectFormat {
  pub fn file_name(&self) -> &'static str {
    match self {
      ProjectFormat::Yaml => "project.yaml",
      ProjectFormat::Json => "project.json",
    }
  }
}

impl fmt::Display for ProjectFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ProjectFormat::Yaml => write!(f, "yaml"),
      ProjectFormat::Json => write!(f, "json"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown project format `{0}` (expected yaml or json)")]
pub struct UnknownFormat(pub String);

impl FromStr for ProjectFormat {
  type Err = UnknownFormat;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "yaml" | "yml" => Ok(ProjectFormat::Yaml),
      "json" => Ok(ProjectFormat::Json),
      _ => Err(UnknownFormat(s.to_string())),
    }
  }
}

/// Result of synthesizing a build context.
#[derive(Debug)]
pub struct Synthesis {
  pub project: Project,
  /// Deferred build operations in declaration order.
  pub pipeline: Pipeline,
  pub graph: DependencyGraph,
}

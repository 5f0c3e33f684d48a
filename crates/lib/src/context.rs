//! The build context.
//!
//! One [`BuildContext`] exists per build invocation. It owns the [`Store`]:
//! every declared resource and variable, the deferred build operations, the
//! named outputs, the link registry, and per-principal grant state.
//!
//! # Phases
//!
//! The context starts in the declaration phase, where nodes are appended and
//! capabilities linked. [`BuildContext::synthesize`] seals it; from then on
//! every mutation panics, since a late declaration would be silently missing
//! from the emitted project.
//!
//! # Concurrency
//!
//! Handles are cheap clones of one `Arc`. All access goes through a single
//! mutex, so declarations from concurrent tasks are safe; they are not faster.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::environment::Environment;
use crate::graph::DependencyGraph;
use crate::link::{LinkKey, LinkProperties, Linkable, PolicyDocument, Principal, PrincipalState};
use crate::pipeline::{BuildOp, Pipeline};
use crate::project::{Project, SynthError, Synthesis};
use crate::resource::{Resource, ResourceRef};
use crate::value::Value;
use crate::variable::{Variable, VariableRef};

/// Everything captured during declaration.
#[derive(Debug, Default)]
pub(crate) struct Store {
  pub sealed: bool,
  pub resources: Vec<Resource>,
  pub variables: Vec<Variable>,
  pub names: HashSet<String>,
  pub build_ops: Vec<BuildOp>,
  pub outputs: IndexMap<String, Value>,
  pub links: IndexMap<LinkKey, LinkProperties>,
  /// Keyed by the principal node's physical name.
  pub principals: IndexMap<String, PrincipalState>,
}

impl Store {
  fn claim_name(&mut self, physical_name: &str, kind: &str) {
    if !self.names.insert(physical_name.to_string()) {
      panic!("duplicate physical name `{physical_name}`: another node already uses it (while declaring {kind})");
    }
  }

  fn has_resource(&self, physical_name: &str) -> bool {
    self.resources.iter().any(|r| r.physical_name() == physical_name)
  }
}

struct Inner {
  project: String,
  stage: String,
  store: Mutex<Store>,
}

/// Handle to the graph being captured by one build invocation.
#[derive(Clone)]
pub struct BuildContext {
  inner: Arc<Inner>,
}

impl std::fmt::Debug for BuildContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BuildContext")
      .field("project", &self.inner.project)
      .field("stage", &self.inner.stage)
      .field("sealed", &self.is_sealed())
      .finish_non_exhaustive()
  }
}

impl BuildContext {
  pub fn new(project: &str, stage: &str) -> Self {
    Self {
      inner: Arc::new(Inner {
        project: project.to_string(),
        stage: stage.to_string(),
        store: Mutex::new(Store::default()),
      }),
    }
  }

  pub fn project(&self) -> &str {
    &self.inner.project
  }

  pub fn stage(&self) -> &str {
    &self.inner.stage
  }

  /// A panic inside one mutation must not hide the store from later readers.
  fn store(&self) -> MutexGuard<'_, Store> {
    self.inner.store.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn mutate<R>(&self, action: &str, f: impl FnOnce(&mut Store) -> R) -> R {
    let mut store = self.store();
    if store.sealed {
      drop(store);
      panic!("cannot {action}: the build context is sealed");
    }
    f(&mut store)
  }

  /// Append a resource. Prefer [`Resource::builder`].
  ///
  /// # Panics
  ///
  /// Panics if the context is sealed or the physical name is taken.
  pub fn track_resource(&self, resource: Resource) -> ResourceRef {
    let node = resource.to_ref();
    self.mutate("declare a resource", |store| {
      store.claim_name(resource.physical_name(), "a resource");
      store.resources.push(resource);
    });
    debug!(name = %node.name(), physical_name = %node.physical_name(), type_tag = %node.type_tag(), "resource declared");
    node
  }

  /// Append a variable. Prefer [`Variable::builder`].
  ///
  /// # Panics
  ///
  /// Panics if the context is sealed or the physical name is taken.
  pub fn track_variable(&self, variable: Variable) -> VariableRef {
    let node = variable.to_ref();
    self.mutate("declare a variable", |store| {
      store.claim_name(variable.physical_name(), "a variable");
      store.variables.push(variable);
    });
    debug!(name = %node.name(), physical_name = %node.physical_name(), "variable declared");
    node
  }

  pub(crate) fn track_principal(&self, state: PrincipalState) {
    let physical_name = state.principal.node().physical_name().to_string();
    self.mutate("declare a principal", |store| {
      if !store.has_resource(&physical_name) {
        panic!("resource `{physical_name}` was not declared in this build context");
      }
      if store.principals.contains_key(&physical_name) {
        panic!("resource `{physical_name}` is already a principal");
      }
      store.principals.insert(physical_name.clone(), state);
    });
    debug!(physical_name = %physical_name, "principal declared");
  }

  /// Record exposed properties in the link registry, replacing any entry
  /// with the same key. Returns `true` if an entry was replaced.
  pub fn track_link(&self, properties: LinkProperties) -> bool {
    let key = properties.key();
    self.mutate("record a link", |store| store.links.insert(key, properties).is_some())
  }

  /// Grant `capability` to `principal`.
  ///
  /// Replaces the permission statement and environment entries of any earlier
  /// link with the same key, then records the capability in the link registry.
  /// Repeating the call is a no-op.
  ///
  /// # Panics
  ///
  /// Panics if `principal` was not declared in this context, or the context
  /// is sealed.
  pub fn link(&self, principal: &Principal, capability: &dyn Linkable) {
    let link = capability.link();
    let key = link.key();
    let physical_name = principal.node().physical_name();

    self.mutate("link a capability", |store| {
      let Some(state) = store.principals.get_mut(physical_name) else {
        panic!("`{physical_name}` is not a principal in this build context");
      };
      state.apply(&key, &link);
      store.links.insert(key.clone(), link.registry_entry());
    });

    debug!(principal = %physical_name, capability = %key, actions = link.actions.len(), "capability linked");
  }

  /// Queue a build operation to run after synthesis.
  pub fn defer_build(&self, op: BuildOp) {
    let name = op.name();
    let position = self.mutate("defer a build", |store| {
      store.build_ops.push(op);
      store.build_ops.len()
    });
    debug!(step = position - 1, name = %name, "build deferred");
  }

  /// Export a named value from the project. Setting a name again replaces it.
  pub fn set_output(&self, name: &str, value: impl Into<Value>) {
    let value = value.into();
    self.mutate("set an output", |store| store.outputs.insert(name.to_string(), value));
  }

  pub fn resources(&self) -> Vec<Resource> {
    self.store().resources.clone()
  }

  pub fn variables(&self) -> Vec<Variable> {
    self.store().variables.clone()
  }

  pub fn outputs(&self) -> IndexMap<String, Value> {
    self.store().outputs.clone()
  }

  pub fn build_ops(&self) -> Vec<BuildOp> {
    self.store().build_ops.clone()
  }

  pub fn link_registry(&self) -> Vec<LinkProperties> {
    self.store().links.values().cloned().collect()
  }

  pub fn policy_of(&self, principal: &Principal) -> Option<PolicyDocument> {
    let store = self.store();
    store
      .principals
      .get(principal.node().physical_name())
      .map(|state| state.policy.clone())
  }

  pub fn environment_of(&self, principal: &Principal) -> Option<Environment> {
    let store = self.store();
    store
      .principals
      .get(principal.node().physical_name())
      .and_then(|state| state.environment.clone())
  }

  /// End the declaration phase. Idempotent.
  pub fn seal(&self) {
    let mut store = self.store();
    if !store.sealed {
      store.sealed = true;
      info!(
        resources = store.resources.len(),
        variables = store.variables.len(),
        build_ops = store.build_ops.len(),
        "declaration sealed"
      );
    }
  }

  pub fn is_sealed(&self) -> bool {
    self.store().sealed
  }

  /// Seal the context and translate the captured graph.
  ///
  /// # Errors
  ///
  /// Returns `SynthError` if a property holds unparseable reference text or
  /// the references form a cycle.
  pub fn synthesize(&self) -> Result<Synthesis, SynthError> {
    self.seal();

    let (project, pipeline) = {
      let store = self.store();
      (
        Project::from_store(self.project(), &store),
        Pipeline::new(store.build_ops.clone()),
      )
    };

    let graph = DependencyGraph::from_project(&project)?;
    let order = graph.topological_order()?;
    debug!(order = ?order, "dependency order");

    info!(
      project = %project.name,
      resources = project.resources.len(),
      variables = project.variables.len(),
      outputs = project.outputs.len(),
      build_ops = pipeline.len(),
      "synthesis complete"
    );

    Ok(Synthesis { project, pipeline, graph })
  }
}

//! Nodes that own an identity and accept capability grants.

use std::collections::HashMap;

use crate::consts::DEFAULT_POLICY_PROPERTY;
use crate::context::BuildContext;
use crate::environment::{Environment, EnvironmentShape};
use crate::output::Output;
use crate::resource::ResourceRef;

use super::{Link, LinkKey, Linkable, PolicyDocument, PolicyStatement};

/// A declared node whose identity receives permission statements.
///
/// The principal remembers where, inside the node's properties, its policy
/// document and environment are written at synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
  node: ResourceRef,
  policy_path: String,
  environment: Option<(EnvironmentShape, String)>,
}

impl Principal {
  pub fn builder(node: &ResourceRef) -> PrincipalBuilder {
    PrincipalBuilder {
      principal: Principal {
        node: node.clone(),
        policy_path: DEFAULT_POLICY_PROPERTY.to_string(),
        environment: None,
      },
      seed: Vec::new(),
    }
  }

  pub fn node(&self) -> &ResourceRef {
    &self.node
  }

  /// Dotted property path that receives the policy document.
  pub fn policy_path(&self) -> &str {
    &self.policy_path
  }

  /// Dotted property path that receives the environment, if any.
  pub fn environment_path(&self) -> Option<&str> {
    self.environment.as_ref().map(|(_, path)| path.as_str())
  }

  pub(crate) fn new_state(&self, seed: Vec<(String, Output)>) -> PrincipalState {
    let environment = self.environment.as_ref().map(|(shape, _)| {
      let mut env = Environment::new(*shape);
      env.merge(seed);
      env
    });
    PrincipalState {
      principal: self.clone(),
      policy: PolicyDocument::new(),
      environment,
      linked_env: HashMap::new(),
    }
  }
}

#[derive(Debug, Clone)]
#[must_use = "a principal must be declared before it can link capabilities"]
pub struct PrincipalBuilder {
  principal: Principal,
  seed: Vec<(String, Output)>,
}

impl PrincipalBuilder {
  pub fn policy_property(mut self, path: &str) -> Self {
    self.principal.policy_path = path.to_string();
    self
  }

  /// Give the principal an environment rendered as `shape` at `path`.
  pub fn environment(mut self, shape: EnvironmentShape, path: &str) -> Self {
    self.principal.environment = Some((shape, path.to_string()));
    self
  }

  /// Seed an environment entry. Ignored without [`environment`](Self::environment).
  pub fn env(mut self, key: &str, value: impl Into<Output>) -> Self {
    self.seed.push((key.to_string(), value.into()));
    self
  }

  /// # Panics
  ///
  /// Panics if the node was not declared in `ctx`, is already a principal, or
  /// `ctx` is sealed.
  pub fn declare(self, ctx: &BuildContext) -> Principal {
    let state = self.principal.new_state(self.seed);
    ctx.track_principal(state);
    self.principal
  }
}

/// The per-principal state kept by the build context.
#[derive(Debug, Clone)]
pub(crate) struct PrincipalState {
  pub principal: Principal,
  pub policy: PolicyDocument,
  pub environment: Option<Environment>,
  /// Environment keys each link wrote, dropped when the link is replaced.
  pub linked_env: HashMap<LinkKey, Vec<String>>,
}

impl PrincipalState {
  /// Apply `link` under `key`, replacing whatever an earlier link with the
  /// same key granted or exposed.
  pub fn apply(&mut self, key: &LinkKey, link: &Link) {
    match PolicyStatement::from_link(link) {
      Some(statement) => {
        self.policy.grant(key.clone(), statement);
      }
      None => {
        self.policy.revoke(key);
      }
    }

    let Some(env) = self.environment.as_mut() else {
      return;
    };
    let entries = link.properties.as_ref().map(|p| p.environment()).unwrap_or_default();
    let keys: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
    for stale in self.linked_env.remove(key).unwrap_or_default() {
      if !keys.contains(&stale) {
        env.remove(&stale);
      }
    }
    if !keys.is_empty() {
      self.linked_env.insert(key.clone(), keys);
    }
    env.merge(entries);
  }
}

/// Something that links capabilities on behalf of a principal.
///
/// Higher-level constructs (a function with its role) implement this by
/// returning their principal.
pub trait RoleProvider {
  fn principal(&self) -> &Principal;

  /// Grant `capability` to the principal. Linking the same capability again
  /// replaces the earlier grant.
  fn link(&self, ctx: &BuildContext, capability: &dyn Linkable) {
    ctx.link(self.principal(), capability);
  }
}

impl RoleProvider for Principal {
  fn principal(&self) -> &Principal {
    self
  }
}

//! Dependency graph of a synthesized project.
//!
//! Edges run from a dependency to its dependent and come from three places:
//! explicit `depends_on` lists, provider bindings, and every reference found
//! in a record's properties or a variable's definition. The engine orders
//! provisioning itself; the graph exists to reject cycles before anything is
//! emitted and to answer dependency queries.

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::warn;

use crate::project::{Project, SynthError};

#[derive(Debug, Clone)]
pub struct DependencyGraph {
  graph: DiGraph<String, ()>,
  nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
  /// Build the graph for every resource and variable in `project`.
  ///
  /// References to names the project does not define are logged and skipped;
  /// the engine may supply them (stack references, provider defaults).
  ///
  /// # Errors
  ///
  /// Returns `Reference` for unparseable reference text and `Cycle` if the
  /// references are circular.
  pub fn from_project(project: &Project) -> Result<Self, SynthError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for name in project.resources.keys().chain(project.variables.keys()) {
      nodes.insert(name.clone(), graph.add_node(name.clone()));
    }

    let mut dependencies: Vec<(&String, BTreeSet<String>)> = Vec::new();
    for (name, record) in &project.resources {
      let roots = record.references().map_err(|source| SynthError::Reference {
        node: name.clone(),
        source,
      })?;
      dependencies.push((name, roots));
    }
    for (name, definition) in &project.variables {
      let roots = definition.references().map_err(|source| SynthError::Reference {
        node: name.clone(),
        source,
      })?;
      dependencies.push((name, roots));
    }

    for (name, roots) in dependencies {
      let dependent = nodes[name];
      for root in roots {
        match nodes.get(&root) {
          Some(&dependency) => {
            graph.update_edge(dependency, dependent, ());
          }
          None => warn!(node = %name, reference = %root, "reference to a node outside the project"),
        }
      }
    }

    let dag = Self { graph, nodes };
    dag.topological_order()?;
    Ok(dag)
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  pub fn contains(&self, name: &str) -> bool {
    self.nodes.contains_key(name)
  }

  /// Direct dependencies of `name`, sorted.
  pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
    self.neighbors(name, Direction::Incoming)
  }

  /// Direct dependents of `name`, sorted.
  pub fn dependents_of(&self, name: &str) -> Vec<&str> {
    self.neighbors(name, Direction::Outgoing)
  }

  fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
    let Some(&idx) = self.nodes.get(name) else {
      return Vec::new();
    };
    let mut names: Vec<&str> = self
      .graph
      .neighbors_directed(idx, direction)
      .map(|n| self.graph[n].as_str())
      .collect();
    names.sort_unstable();
    names
  }

  /// Names ordered so that dependencies come before dependents.
  pub fn topological_order(&self) -> Result<Vec<String>, SynthError> {
    let sorted = toposort(&self.graph, None).map_err(|cycle| SynthError::Cycle {
      node: self.graph[cycle.node_id()].clone(),
    })?;
    Ok(sorted.into_iter().map(|idx| self.graph[idx].clone()).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::BuildContext;
  use crate::output::Output;
  use crate::resource::Resource;
  use crate::variable::Variable;
  use tracing_test::traced_test;

  fn position(order: &[String], name: &str) -> usize {
    order.iter().position(|n| n == name).unwrap()
  }

  #[test]
  fn references_become_edges() {
    let ctx = BuildContext::new("site", "dev");
    let bucket = Resource::builder("bucket", "aws:s3:Bucket").declare(&ctx);
    let cdn = Resource::builder("cdn", "aws:cloudfront:Distribution")
      .property("origin", bucket.attr("regionalDomainName"))
      .declare(&ctx);
    Variable::builder("site url", crate::interpolate!("https://{}", cdn.attr("domainName"))).declare(&ctx);

    let graph = ctx.synthesize().unwrap().graph;

    assert_eq!(graph.len(), 3);
    assert_eq!(graph.dependencies_of("dev-cdn"), vec!["dev-bucket"]);
    assert_eq!(graph.dependents_of("dev-cdn"), vec!["dev-site-url"]);

    let order = graph.topological_order().unwrap();
    assert!(position(&order, "dev-bucket") < position(&order, "dev-cdn"));
    assert!(position(&order, "dev-cdn") < position(&order, "dev-site-url"));
  }

  #[test]
  fn repeated_references_add_one_edge() {
    let ctx = BuildContext::new("site", "dev");
    let db = Resource::builder("db", "aws:rds:Instance").declare(&ctx);
    Resource::builder("app", "aws:ecs:Service")
      .property("host", db.attr("address"))
      .property("port", db.attr("port"))
      .depends_on(&db)
      .declare(&ctx);

    let graph = ctx.synthesize().unwrap().graph;
    assert_eq!(graph.dependents_of("dev-db"), vec!["dev-app"]);
  }

  #[test]
  fn cycles_are_rejected() {
    let ctx = BuildContext::new("site", "dev");
    Resource::builder("a", "test:Node")
      .property("peer", Output::reference("dev-b").field("id"))
      .declare(&ctx);
    Resource::builder("b", "test:Node")
      .property("peer", Output::reference("dev-a").field("id"))
      .declare(&ctx);

    let err = ctx.synthesize().unwrap_err();
    assert!(matches!(err, SynthError::Cycle { .. }));
  }

  #[test]
  fn self_reference_is_a_cycle() {
    let ctx = BuildContext::new("site", "dev");
    Resource::builder("loop", "test:Node")
      .property("me", Output::reference("dev-loop").field("id"))
      .declare(&ctx);

    assert!(matches!(ctx.synthesize().unwrap_err(), SynthError::Cycle { node } if node == "dev-loop"));
  }

  #[test]
  #[traced_test]
  fn unknown_references_are_logged_not_fatal() {
    let ctx = BuildContext::new("site", "dev");
    Resource::builder("app", "test:Node")
      .property("network", Output::reference("shared-vpc").field("id"))
      .declare(&ctx);

    let graph = ctx.synthesize().unwrap().graph;
    assert!(graph.dependencies_of("dev-app").is_empty());
    assert!(!graph.contains("shared-vpc"));
    assert!(logs_contain("reference to a node outside the project"));
  }

  #[test]
  fn malformed_reference_text_is_reported() {
    let ctx = BuildContext::new("site", "dev");
    Resource::builder("app", "test:Node")
      .property("url", "https://${dev-cdn.domain")
      .declare(&ctx);

    assert!(matches!(ctx.synthesize().unwrap_err(), SynthError::Reference { node, .. } if node == "dev-app"));
  }
}

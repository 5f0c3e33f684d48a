//! nimbus-lib: declarative cloud-graph capture for Nimbus
//!
//! This crate provides the pieces a declaration program is built from:
//! - `Output`: lazy, path-addressable references to provisioning-time values
//! - `Resource` / `Variable`: immutable nodes registered into a `BuildContext`
//! - `link`: least-privilege grants and environment bindings between nodes
//! - `Project`: the engine-facing description synthesized from a context
//! - `Pipeline`: deferred build steps run after synthesis

pub mod codegen;
pub mod consts;
pub mod context;
pub mod environment;
pub mod graph;
pub mod link;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod project;
pub mod resource;
pub mod runner;
pub mod runtime;
pub mod util;
pub mod value;
pub mod variable;

//! Computed lookups.
//!
//! A [`Variable`] shares the naming and registration rules of a resource but
//! holds an opaque expression instead of a property bag. The engine evaluates
//! the expression; declaration code only references its result.

use crate::consts::DEFAULT_MAX_LENGTH;
use crate::context::BuildContext;
use crate::naming::physical_name;
use crate::output::Output;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
  name: String,
  physical_name: String,
  definition: Value,
}

impl Variable {
  pub fn builder(name: &str, definition: impl Into<Value>) -> VariableBuilder {
    VariableBuilder {
      name: name.to_string(),
      definition: definition.into(),
      max_length: DEFAULT_MAX_LENGTH,
    }
  }

  /// A provider function call, e.g. resolving a hosted zone by domain.
  ///
  /// `return_field` selects one field of the call result.
  pub fn invoke(name: &str, function: &str, arguments: impl Into<Value>, return_field: Option<&str>) -> VariableBuilder {
    let mut call = Value::map([("function", Value::from(function)), ("arguments", arguments.into())]);
    if let Some(field) = return_field {
      call.set_path("return", Value::from(field));
    }
    Self::builder(name, Value::map([("fn::invoke", call)]))
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn physical_name(&self) -> &str {
    &self.physical_name
  }

  pub fn definition(&self) -> &Value {
    &self.definition
  }

  pub fn to_ref(&self) -> VariableRef {
    VariableRef {
      name: self.name.clone(),
      physical_name: self.physical_name.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableRef {
  name: String,
  physical_name: String,
}

impl VariableRef {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn physical_name(&self) -> &str {
    &self.physical_name
  }

  pub fn output(&self) -> Output {
    Output::reference(&self.physical_name)
  }

  pub fn attr(&self, name: &str) -> Output {
    self.output().field(name)
  }
}

#[derive(Debug, Clone)]
#[must_use = "a variable is only part of the graph once declared"]
pub struct VariableBuilder {
  name: String,
  definition: Value,
  max_length: usize,
}

impl VariableBuilder {
  pub fn max_length(mut self, max_length: usize) -> Self {
    self.max_length = max_length;
    self
  }

  /// # Panics
  ///
  /// Panics if `ctx` is sealed or the physical name is already taken.
  pub fn declare(self, ctx: &BuildContext) -> VariableRef {
    let variable = Variable {
      physical_name: physical_name(ctx.stage(), &self.name, self.max_length),
      name: self.name,
      definition: self.definition,
    };
    assert!(
      !variable.physical_name.is_empty(),
      "variable `{}` in stage `{}` has an empty physical name",
      variable.name,
      ctx.stage()
    );
    ctx.track_variable(variable)
  }
}

//! Symbolic references to values that only exist after provisioning.
//!
//! An [`Output`] stands in for an attribute the provisioning engine resolves
//! later (a generated ARN, an IP address, an endpoint hostname). It is purely
//! structural: a literal prefix, the physical name of the node it is rooted
//! at, and a path into that node's attributes.
//!
//! # Rendering
//!
//! - literal: `prefix` verbatim
//! - reference: `prefix${root.field[0]["key"]}`
//!
//! Rendered text is what the engine consumes. [`parse`] recovers the
//! references embedded in rendered text so that interpolated strings still
//! contribute dependencies.
//!
//! # Escaping
//!
//! Use `$${` to produce a literal `${` sequence. A lone `$` passes through
//! unchanged, so shell variables like `$HOME` need no escaping.
//!
//! # Example
//!
//! ```
//! use nimbus_lib::interpolate;
//! use nimbus_lib::output::Output;
//!
//! let bucket = Output::reference("dev-assets");
//! assert_eq!(bucket.field("arn").render(), "${dev-assets.arn}");
//!
//! let url = interpolate!("https://{}/index.html", bucket.field("domain"));
//! assert_eq!(url.render(), "https://${dev-assets.domain}/index.html");
//! ```

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// One step of a path into a node's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
  /// `.name`
  Property(String),
  /// `[index]`
  Index(usize),
  /// `["key"]`
  Key(String),
}

impl fmt::Display for PathSegment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PathSegment::Property(name) => write!(f, ".{name}"),
      PathSegment::Index(index) => write!(f, "[{index}]"),
      PathSegment::Key(key) => write!(f, "[\"{key}\"]"),
    }
  }
}

/// A lazy, path-addressable reference to a provisioning-time value.
///
/// Equality and hashing are structural; the rendered string is a projection
/// and never used for identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Output {
  prefix: String,
  root: String,
  path: Vec<PathSegment>,
}

impl Output {
  /// A pure literal.
  pub fn literal(text: impl Into<String>) -> Self {
    Self {
      prefix: text.into(),
      root: String::new(),
      path: Vec::new(),
    }
  }

  /// A reference rooted at the node whose physical name is `root`.
  ///
  /// # Panics
  ///
  /// Panics if `root` is empty, since that would silently produce a literal.
  pub fn reference(root: impl Into<String>) -> Self {
    let root = root.into();
    assert!(!root.is_empty(), "output reference requires a non-empty root");
    Self {
      prefix: String::new(),
      root,
      path: Vec::new(),
    }
  }

  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  pub fn root(&self) -> Option<&str> {
    (!self.root.is_empty()).then_some(self.root.as_str())
  }

  pub fn path(&self) -> &[PathSegment] {
    &self.path
  }

  pub fn is_literal(&self) -> bool {
    self.root.is_empty()
  }

  /// Derive `self.name`.
  pub fn field(&self, name: impl Into<String>) -> Self {
    self.child(PathSegment::Property(name.into()))
  }

  /// Derive `self[index]`.
  pub fn index(&self, index: usize) -> Self {
    self.child(PathSegment::Index(index))
  }

  /// Derive `self["key"]`.
  pub fn key(&self, key: impl Into<String>) -> Self {
    self.child(PathSegment::Key(key.into()))
  }

  /// Prepend literal text.
  pub fn with_prefix(&self, text: &str) -> Self {
    let mut out = self.clone();
    out.prefix.insert_str(0, text);
    out
  }

  pub fn render(&self) -> String {
    self.to_string()
  }

  fn child(&self, segment: PathSegment) -> Self {
    assert!(
      !self.is_literal(),
      "cannot derive {segment} from literal output {:?}",
      self.prefix
    );
    let mut path = Vec::with_capacity(self.path.len() + 1);
    path.extend_from_slice(&self.path);
    path.push(segment);
    Self {
      prefix: self.prefix.clone(),
      root: self.root.clone(),
      path,
    }
  }
}

impl fmt::Display for Output {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.prefix)?;
    if self.root.is_empty() {
      return Ok(());
    }
    write!(f, "${{{}", self.root)?;
    for segment in &self.path {
      write!(f, "{segment}")?;
    }
    f.write_str("}")
  }
}

impl Serialize for Output {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl From<&str> for Output {
  fn from(text: &str) -> Self {
    Output::literal(text)
  }
}

impl From<String> for Output {
  fn from(text: String) -> Self {
    Output::literal(text)
  }
}

impl From<&Output> for Output {
  fn from(output: &Output) -> Self {
    output.clone()
  }
}

macro_rules! literal_from_display {
  ($($ty:ty),*) => {
    $(
      impl From<$ty> for Output {
        fn from(value: $ty) -> Self {
          Output::literal(value.to_string())
        }
      }
    )*
  };
}

literal_from_display!(bool, i32, i64, u16, u32, u64, usize, f64);

/// Build a literal [`Output`] from format arguments.
///
/// Embedded outputs render through `Display`, so their `${...}` syntax is
/// preserved verbatim inside the resulting literal.
#[macro_export]
macro_rules! interpolate {
  ($($arg:tt)*) => {
    $crate::output::Output::literal(format!($($arg)*))
  };
}

/// A segment of rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no references)
  Literal(String),

  /// An embedded reference
  Reference(Output),
}

/// Errors that can occur while parsing rendered text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
  #[error("unclosed reference at position {0}")]
  Unclosed(usize),

  #[error("empty reference root at position {0}")]
  EmptyRoot(usize),

  #[error("malformed reference path: {0}")]
  Malformed(String),
}

/// Split rendered text into literal runs and references.
///
/// # Errors
///
/// Returns an error if a reference is unclosed or its path is malformed.
pub fn parse(input: &str) -> Result<Vec<Segment>, OutputError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some((_, '$')) => {
        chars.next();
        if let Some((_, '{')) = chars.peek() {
          // Escaped: $${ -> ${ (literal)
          chars.next();
          literal.push_str("${");
        } else {
          literal.push_str("$$");
        }
      }
      Some((_, '{')) => {
        chars.next();

        let mut body = String::new();
        let mut in_quotes = false;
        let mut found_close = false;
        for (_, c) in chars.by_ref() {
          match c {
            '"' => in_quotes = !in_quotes,
            '}' if !in_quotes => {
              found_close = true;
              break;
            }
            _ => {}
          }
          body.push(c);
        }

        if !found_close {
          return Err(OutputError::Unclosed(pos));
        }

        let mut reference = parse_reference_body(&body, pos)?;
        reference.prefix = std::mem::take(&mut literal);
        segments.push(Segment::Reference(reference));
      }
      _ => literal.push('$'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Every reference embedded in rendered text.
pub fn references(input: &str) -> Result<Vec<Output>, OutputError> {
  Ok(
    parse(input)?
      .into_iter()
      .filter_map(|segment| match segment {
        Segment::Reference(output) => Some(output),
        Segment::Literal(_) => None,
      })
      .collect(),
  )
}

/// Parse the content inside `${` and `}`.
fn parse_reference_body(body: &str, pos: usize) -> Result<Output, OutputError> {
  let root_end = body.find(['.', '[']).unwrap_or(body.len());
  let root = &body[..root_end];
  if root.is_empty() {
    return Err(OutputError::EmptyRoot(pos));
  }

  let mut path = Vec::new();
  let mut rest = &body[root_end..];
  while !rest.is_empty() {
    if let Some(after_dot) = rest.strip_prefix('.') {
      let end = after_dot.find(['.', '[']).unwrap_or(after_dot.len());
      let name = &after_dot[..end];
      if name.is_empty() {
        return Err(OutputError::Malformed(body.to_string()));
      }
      path.push(PathSegment::Property(name.to_string()));
      rest = &after_dot[end..];
    } else if let Some(after_bracket) = rest.strip_prefix("[\"") {
      let end = after_bracket
        .find("\"]")
        .ok_or_else(|| OutputError::Malformed(body.to_string()))?;
      path.push(PathSegment::Key(after_bracket[..end].to_string()));
      rest = &after_bracket[end + 2..];
    } else if let Some(after_bracket) = rest.strip_prefix('[') {
      let end = after_bracket
        .find(']')
        .ok_or_else(|| OutputError::Malformed(body.to_string()))?;
      let index = after_bracket[..end]
        .parse::<usize>()
        .map_err(|_| OutputError::Malformed(body.to_string()))?;
      path.push(PathSegment::Index(index));
      rest = &after_bracket[end + 1..];
    } else {
      return Err(OutputError::Malformed(body.to_string()));
    }
  }

  Ok(Output {
    prefix: String::new(),
    root: root.to_string(),
    path,
  })
}

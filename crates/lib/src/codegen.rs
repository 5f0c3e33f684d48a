//! Typed accessor generation for linked capabilities.
//!
//! Renders a Rust module with one submodule per capability and one function
//! per exposed property, each reading its value through
//! [`runtime::linked`](crate::runtime::linked).

use std::fmt::Write;

use crate::consts::APP_NAME;
use crate::link::LinkProperties;
use crate::naming::tokenize;

const RUST_KEYWORDS: &[&str] = &[
  "as", "async", "await", "box", "break", "const", "continue", "dyn", "else", "enum", "extern", "false", "fn", "for",
  "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return", "static", "struct",
  "trait", "true", "try", "type", "unsafe", "use", "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers.
const PATH_KEYWORDS: &[&str] = &["crate", "self", "Self", "super"];

/// Render accessor source for every entry of a link registry.
pub fn accessors(registry: &[LinkProperties]) -> String {
  let mut out = format!("// Generated by {APP_NAME}. Do not edit.\n");

  for entry in registry {
    if entry.properties.is_empty() {
      continue;
    }
    let module = ident(&[entry.capability_type.as_str(), entry.capability_name.as_str()]);
    let _ = writeln!(out, "\npub mod {module} {{");
    for (i, key) in entry.properties.keys().enumerate() {
      if i > 0 {
        out.push('\n');
      }
      let _ = writeln!(out, "  pub fn {}() -> String {{", ident(&[key.as_str()]));
      let _ = writeln!(
        out,
        "    nimbus_lib::runtime::linked({:?}, {:?}, {:?})",
        entry.capability_type, entry.capability_name, key
      );
      out.push_str("  }\n");
    }
    out.push_str("}\n");
  }

  out
}

fn ident(parts: &[&str]) -> String {
  let name = tokenize(parts, '_', usize::MAX);
  if name.is_empty() {
    return "_unnamed".to_string();
  }
  if name.starts_with(|c: char| c.is_ascii_digit()) || PATH_KEYWORDS.contains(&name.as_str()) {
    return format!("_{name}");
  }
  if RUST_KEYWORDS.contains(&name.as_str()) {
    return format!("r#{name}");
  }
  name
}

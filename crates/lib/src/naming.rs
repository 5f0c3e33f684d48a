//! Deterministic, length-bounded identifier generation.
//!
//! Every external-facing name goes through [`tokenize`]. Names that fit within
//! the provider's limit are returned as-is; longer names are truncated and
//! suffixed with a short digest of the full token, so previously provisioned
//! infrastructure keeps its name across runs.
//!
//! ```
//! use nimbus_lib::naming::{physical_name, tokenize};
//!
//! assert_eq!(tokenize(&["myApp", "Static Assets"], '-', 55), "my-app-static-assets");
//! assert_eq!(physical_name("prod", "User Uploads", 55), "prod-user-uploads");
//! ```

use crate::consts::{ENV_SEPARATOR, HASH_SUFFIX_LEN, NAME_SEPARATOR};
use crate::util::hash::digest_hex;

/// Normalize `parts` into a single `separator`-delimited token of at most
/// `max_length` characters.
///
/// The separator is expected to be a non-alphanumeric ASCII character.
pub fn tokenize(parts: &[&str], separator: char, max_length: usize) -> String {
  debug_assert!(!separator.is_ascii_alphanumeric(), "separator must not be alphanumeric");

  let token = normalize(&parts.join(" "), separator);
  if token.len() <= max_length {
    return token;
  }

  let digest = digest_hex(&token, HASH_SUFFIX_LEN.min(max_length));
  let keep = max_length.saturating_sub(HASH_SUFFIX_LEN + 1);
  // Output is ASCII, so byte slicing lands on char boundaries.
  let prefix = token[..keep].trim_end_matches(separator);
  if prefix.is_empty() {
    return digest;
  }

  format!("{prefix}{separator}{digest}")
}

/// Physical (provider-facing) name for a node declared as `name` in `stage`.
pub fn physical_name(stage: &str, name: &str, max_length: usize) -> String {
  tokenize(&[stage, name], NAME_SEPARATOR, max_length)
}

/// Upper snake-case key used for environment variables.
///
/// `env_key(&[&env_key(parts)]) == env_key(parts)` for every input.
pub fn env_key(parts: &[&str]) -> String {
  tokenize(parts, ENV_SEPARATOR, usize::MAX).to_ascii_uppercase()
}

fn normalize(input: &str, separator: char) -> String {
  let mut out = String::with_capacity(input.len());
  let mut pending_separator = false;

  for word in split_camel_case(input).chars() {
    if word.is_ascii_alphanumeric() {
      if pending_separator && !out.is_empty() {
        out.push(separator);
      }
      pending_separator = false;
      out.push(word.to_ascii_lowercase());
    } else {
      pending_separator = true;
    }
  }

  out
}

/// Insert a space at every camel-case word boundary.
///
/// `fooBar` → `foo Bar`, `HTTPServer` → `HTTP Server`, `v2Api` → `v2 Api`.
fn split_camel_case(input: &str) -> String {
  let chars: Vec<char> = input.chars().collect();
  let mut out = String::with_capacity(input.len() + 8);

  for (i, &c) in chars.iter().enumerate() {
    if i > 0 && c.is_ascii_uppercase() {
      let prev = chars[i - 1];
      let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
      // Digit and acronym boundaries need a following lowercase letter, so an
      // already upper-cased key never grows new boundaries.
      if prev.is_ascii_lowercase() || ((prev.is_ascii_digit() || prev.is_ascii_uppercase()) && next_is_lower) {
        out.push(' ');
      }
    }
    out.push(c);
  }

  out
}

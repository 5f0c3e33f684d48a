//! Consumer side of capability linking.
//!
//! A linked principal receives each exposed property as an environment
//! variable named `UPPER_SNAKE(type name key)`. Code running inside the
//! deployed function reads them back through [`linked`].

use crate::naming::env_key;

/// The environment variable holding `key` of the linked capability.
pub fn linked_var(capability_type: &str, capability_name: &str, key: &str) -> String {
  env_key(&[capability_type, capability_name, key])
}

/// Read a linked property, or `None` if the capability was not linked.
pub fn try_linked(capability_type: &str, capability_name: &str, key: &str) -> Option<String> {
  std::env::var(linked_var(capability_type, capability_name, key)).ok()
}

/// Read a linked property.
///
/// # Panics
///
/// Panics if the variable is missing: the capability was never linked to this
/// principal, which is a bug in the declaration code.
pub fn linked(capability_type: &str, capability_name: &str, key: &str) -> String {
  let var = linked_var(capability_type, capability_name, key);
  match std::env::var(&var) {
    Ok(value) => value,
    Err(_) => panic!("capability `{capability_type} {capability_name}` is not linked: `{var}` is not set"),
  }
}

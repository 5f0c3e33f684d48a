//! Built-in build step implementations.

pub mod exec;
pub mod fetch;
pub mod package;

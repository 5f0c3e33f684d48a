//! Shared utilities.
//!
//! Digest helpers used by the namer, the project writer, and the build pipeline.

pub mod hash;

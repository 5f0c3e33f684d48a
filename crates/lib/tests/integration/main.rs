//! Integration tests for nimbus-lib.

mod common;

mod concurrency_tests;
mod linking_tests;
mod naming_tests;
mod pipeline_tests;

//! Integration tests module
//!
//! End-to-end tests of the trend pipeline and its backends:
//! - Pipeline runs over an in-memory corpus
//! - Error propagation and publish-on-failure behavior
//! - OpenSearch corpus reads and index maintenance against a mock server
//! - Related-term lookup against a mock server

pub mod backend_test;
pub mod error_scenarios;
pub mod fixtures;
pub mod pipeline_test;
pub mod related_test;

//! Integration tests
//!
//! HTTP adapters run against `wiremock` servers; watcher and context tests use
//! in-process fakes on a paused clock.

mod context_test;
mod registry_test;

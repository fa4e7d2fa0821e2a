//! Common test utilities and helpers
//!
//! - Fakes for the Appwrite account and realtime seams
//! - An event recorder for session callbacks
//! - Mock backend helpers built on `wiremock`
//! - Assertion macros and paused-clock helpers

pub mod assertions;
pub mod fakes;

pub use assertions::*;
pub use fakes::*;
pub use mock_server::*;
pub use recorder::*;

//! Shared test fixtures for the workspace.
//!
//! Provides a single, shared PostgreSQL testcontainer across all test files.
//! The fixture is lazily initialized once per test process and automatically
//! cleaned up when the process exits. Tests that need it should skip
//! themselves when the container cannot start.

mod fixtures;

pub use fixtures::*;

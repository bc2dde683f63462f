//! Crate-level integration and property tests.

mod reflow_integration;

//! Observability for the authorization gate.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;

//! Common utilities shared across the authorization gate workspace.

#![warn(clippy::pedantic)]

/// Module for JWT format primitives (size limits, segments, header decoding)
pub mod jwt;

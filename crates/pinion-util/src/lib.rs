//! Shared utilities for Pinion.
//!
//! Cross-cutting concerns used by the resolver crate: the unified error
//! type for file and configuration handling, and filesystem helpers.

pub mod errors;
pub mod fs;

//! Utility functions shared across layers.
//!
//! - [`code_generator`] - Short code generation and validation

pub mod code_generator;

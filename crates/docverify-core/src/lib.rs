//! # docverify-core
//!
//! Core types, traits, and abstractions for docverify.
//!
//! This crate provides the canonical document records, the error type and the
//! generation backend trait that the inference and engine crates build on.

pub mod defaults;
pub mod error;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;

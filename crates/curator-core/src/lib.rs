//! # curator-core
//!
//! Core types, traits, and abstractions for the curator cloud sync engine.
//!
//! This crate provides the local entity models, the cloud payload records,
//! and the collaborator traits (local store, cloud service, connectivity)
//! that the other curator crates depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;

//! # Footsteps Domain
//!
//! Request and response model for the Footsteps resilient request layer.
//!
//! This crate contains:
//! - Request descriptors, methods and bodies
//! - Response snapshots and categorized transport outcomes
//! - The request error taxonomy and Result alias
//! - Layer configuration with its defaults
//!
//! ## Architecture
//! - No dependencies on other Footsteps crates
//! - Only external dependencies allowed
//! - Pure data types, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;

//! Device types and vendor tables
//!
//! This module provides the normalized result of a probe and the tables
//! used to recognise manufacturers and decode densities.

mod types;
pub mod vendors;

pub use types::*;

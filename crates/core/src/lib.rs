//! Domain types for the studio tools job client.
//!
//! Everything here is transport-agnostic: the job model and its phase
//! rules, the three creation tools and their options, and validation of
//! user input before any network call is made.

pub mod error;
pub mod input;
pub mod job;
pub mod tool;
pub mod types;

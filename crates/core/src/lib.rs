//! Shared building blocks for the `lhremote` workspace.
//!
//! Holds the primitive id/timestamp types, the [`error::ServiceError`]
//! taxonomy every other crate reports through, the deadline-bounded
//! polling helpers, and environment-driven configuration.

pub mod config;
pub mod error;
pub mod polling;
pub mod types;

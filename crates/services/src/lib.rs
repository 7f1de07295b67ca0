//! Orchestration on top of the LinkedHelper bridge and databases.
//!
//! - [`app`]: supervise the app's OS process
//! - [`lifecycle`]: start account instances with crash recovery
//! - [`context`]: scoped acquisition of bridge and database handles
//! - [`campaign`]: the campaign workflow

pub mod app;
pub mod campaign;
pub mod context;
pub mod lifecycle;

//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` row struct matching the app's table layout
//! - A `Serialize` entity struct handed to callers
//! - A `Deserialize` create DTO where this workspace inserts rows

pub mod action;
pub mod campaign;
pub mod result;

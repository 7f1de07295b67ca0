//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&SqlitePool` as the first argument and return raw
//! `sqlx::Error`s; [`crate::store`] maps them into service errors.

pub mod campaign_repo;
pub mod statistics_repo;

pub use campaign_repo::CampaignRepo;
pub use statistics_repo::StatisticsRepo;

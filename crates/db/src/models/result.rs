//! Action result rows, written by the app as it processes people.

use serde::Serialize;
use sqlx::FromRow;
use lhremote_core::types::{DbId, Timestamp};

/// One outcome of one action version for one person. Append-only.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct CampaignActionResult {
    pub id: DbId,
    pub action_version_id: DbId,
    pub person_id: DbId,
    /// App-defined result code.
    pub result: i64,
    pub platform: Option<String>,
    pub created_at: Timestamp,
}

//! Repository for the `action_results` table.

use sqlx::SqlitePool;
use lhremote_core::types::DbId;

use crate::models::result::CampaignActionResult;

/// Provides read access to the results the app records per action run.
pub struct StatisticsRepo;

impl StatisticsRepo {
    /// All results produced by any version of any action in the campaign,
    /// oldest first.
    pub async fn list_results(
        pool: &SqlitePool,
        campaign_id: DbId,
    ) -> Result<Vec<CampaignActionResult>, sqlx::Error> {
        sqlx::query_as::<_, CampaignActionResult>(
            "SELECT r.id, r.action_version_id, r.person_id, r.result, r.platform, r.created_at \
             FROM action_results r \
             JOIN action_versions v ON v.id = r.action_version_id \
             JOIN actions a ON a.id = v.action_id \
             WHERE a.campaign_id = ? \
             ORDER BY r.id ASC",
        )
        .bind(campaign_id)
        .fetch_all(pool)
        .await
    }
}

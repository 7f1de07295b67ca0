//! Repository for the `campaigns`, `actions`, `action_configs`,
//! `action_versions` and `exclude_lists` tables.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use lhremote_core::types::DbId;

use crate::models::action::{CampaignAction, CampaignActionRow, CreateAction};
use crate::models::campaign::{Campaign, CampaignRow};

/// Column list for `campaigns` queries.
const COLUMNS: &str = "\
    id, name, description, li_account_id, \
    is_paused, is_archived, is_valid, created_at";

/// Actions joined with the config of their latest version.
const ACTION_SELECT: &str = "\
    SELECT a.id, a.campaign_id, a.name, a.description, \
           c.id AS config_id, c.action_type, c.action_settings, c.cool_down, \
           c.max_action_results_per_iteration, c.is_draft, \
           v.id AS version_id \
    FROM actions a \
    JOIN action_versions v ON v.id = ( \
        SELECT MAX(id) FROM action_versions WHERE action_id = a.id) \
    JOIN action_configs c ON c.id = v.config_id";

/// Person ids bound per DELETE; keeps each statement under SQLite's
/// host-parameter limit.
const RERUN_CHUNK_SIZE: usize = 500;

/// Provides query operations for campaigns and their action chains.
pub struct CampaignRepo;

impl CampaignRepo {
    // ── Campaign queries ─────────────────────────────────────────────

    /// Find a campaign by ID, archived or not.
    pub async fn find_by_id(pool: &SqlitePool, id: DbId) -> Result<Option<Campaign>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM campaigns WHERE id = ?");
        let row = sqlx::query_as::<_, CampaignRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(Campaign::from))
    }

    /// List campaigns ordered by ID, hiding archived ones unless asked.
    pub async fn list(
        pool: &SqlitePool,
        include_archived: bool,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        let query = if include_archived {
            format!("SELECT {COLUMNS} FROM campaigns ORDER BY id ASC")
        } else {
            format!("SELECT {COLUMNS} FROM campaigns WHERE is_archived = 0 ORDER BY id ASC")
        };
        let rows = sqlx::query_as::<_, CampaignRow>(&query)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Campaign::from).collect())
    }

    /// Mark a campaign valid. Returns `true` if a row was updated.
    pub async fn fix_is_valid(pool: &SqlitePool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE campaigns SET is_valid = 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Action chain ─────────────────────────────────────────────────

    /// The campaign's actions in chain order, each with its latest config.
    pub async fn list_actions(
        pool: &SqlitePool,
        campaign_id: DbId,
    ) -> Result<Vec<CampaignAction>, sqlx::Error> {
        let query =
            format!("{ACTION_SELECT} WHERE a.campaign_id = ? ORDER BY a.position ASC, a.id ASC");
        let rows = sqlx::query_as::<_, CampaignActionRow>(&query)
            .bind(campaign_id)
            .fetch_all(pool)
            .await?;
        rows.into_iter().map(CampaignAction::try_from).collect()
    }

    /// Find one action of a campaign with its latest config.
    pub async fn find_action(
        pool: &SqlitePool,
        campaign_id: DbId,
        action_id: DbId,
    ) -> Result<Option<CampaignAction>, sqlx::Error> {
        let query = format!("{ACTION_SELECT} WHERE a.campaign_id = ? AND a.id = ?");
        let row = sqlx::query_as::<_, CampaignActionRow>(&query)
            .bind(campaign_id)
            .bind(action_id)
            .fetch_optional(pool)
            .await?;
        row.map(CampaignAction::try_from).transpose()
    }

    /// Append an action to the end of the chain.
    ///
    /// Inserts the config, the action and its first version in one
    /// transaction, then reads the action back.
    pub async fn add_action(
        pool: &SqlitePool,
        campaign_id: DbId,
        input: &CreateAction,
    ) -> Result<CampaignAction, sqlx::Error> {
        let settings = serde_json::to_string(&input.action_settings)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let now = Utc::now();

        let mut tx = pool.begin().await?;

        let config_id: DbId = sqlx::query_scalar(
            "INSERT INTO action_configs \
                (action_type, action_settings, cool_down, max_action_results_per_iteration, is_draft) \
             VALUES (?, ?, ?, ?, 0) \
             RETURNING id",
        )
        .bind(&input.action_type)
        .bind(&settings)
        .bind(input.resolved_cool_down())
        .bind(input.resolved_max_results())
        .fetch_one(&mut *tx)
        .await?;

        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM actions WHERE campaign_id = ?",
        )
        .bind(campaign_id)
        .fetch_one(&mut *tx)
        .await?;

        let action_id: DbId = sqlx::query_scalar(
            "INSERT INTO actions (campaign_id, name, description, position, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(campaign_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(position)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO action_versions (action_id, config_id, created_at) VALUES (?, ?, ?)")
            .bind(action_id)
            .bind(config_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Self::find_action(pool, campaign_id, action_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    // ── Exclude lists ────────────────────────────────────────────────

    /// Ensure the campaign and each of its actions have an exclude list
    /// for `li_account_id`. Existing lists are kept; returns how many
    /// were created.
    pub async fn create_action_exclude_lists(
        pool: &SqlitePool,
        campaign_id: DbId,
        li_account_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let campaign_level = sqlx::query(
            "INSERT INTO exclude_lists (li_account_id, campaign_id, action_id, created_at) \
             SELECT ?, ?, NULL, ? \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM exclude_lists \
                 WHERE campaign_id = ? AND action_id IS NULL AND li_account_id = ?)",
        )
        .bind(li_account_id)
        .bind(campaign_id)
        .bind(now)
        .bind(campaign_id)
        .bind(li_account_id)
        .execute(&mut *tx)
        .await?;

        let per_action = sqlx::query(
            "INSERT INTO exclude_lists (li_account_id, campaign_id, action_id, created_at) \
             SELECT ?, a.campaign_id, a.id, ? FROM actions a \
             WHERE a.campaign_id = ? \
               AND NOT EXISTS ( \
                   SELECT 1 FROM exclude_lists e \
                   WHERE e.action_id = a.id AND e.li_account_id = ?)",
        )
        .bind(li_account_id)
        .bind(now)
        .bind(campaign_id)
        .bind(li_account_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(campaign_level.rows_affected() + per_action.rows_affected())
    }

    // ── Rerun ────────────────────────────────────────────────────────

    /// Delete the results these people have for any action of the
    /// campaign so the runner processes them again. Returns rows removed.
    pub async fn reset_for_rerun(
        pool: &SqlitePool,
        campaign_id: DbId,
        person_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        if person_ids.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        let mut removed = 0;

        for chunk in person_ids.chunks(RERUN_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "DELETE FROM action_results \
                 WHERE action_version_id IN ( \
                     SELECT v.id FROM action_versions v \
                     JOIN actions a ON a.id = v.action_id \
                     WHERE a.campaign_id = ",
            );
            builder.push_bind(campaign_id);
            builder.push(") AND person_id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            removed += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(removed)
    }
}

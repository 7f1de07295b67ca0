//! Shared fixtures for the repository integration tests.

#![allow(dead_code)]

use lhremote_core::types::DbId;
use lhremote_db::DbPool;
use sqlx::sqlite::SqlitePoolOptions;

const SCHEMA: &str = include_str!("../fixtures/schema.sql");

/// A fresh in-memory database carrying the fixture schema.
///
/// One connection that never expires, otherwise the in-memory database
/// would vanish between queries.
pub async fn pool() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::raw_sql(SCHEMA).execute(&pool).await.expect("schema");
    pool
}

pub async fn insert_campaign(pool: &DbPool, name: &str, is_valid: Option<bool>) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO campaigns (name, description, li_account_id, is_paused, is_archived, is_valid, created_at) \
         VALUES (?, 'fixture', 1, 1, 0, ?, '2024-05-01T10:00:00Z') RETURNING id",
    )
    .bind(name)
    .bind(is_valid)
    .fetch_one(pool)
    .await
    .expect("insert campaign")
}

pub async fn archive(pool: &DbPool, campaign_id: DbId) {
    sqlx::query("UPDATE campaigns SET is_archived = 1 WHERE id = ?")
        .bind(campaign_id)
        .execute(pool)
        .await
        .expect("archive");
}

/// Insert an action with one config version; returns `(action_id, version_id)`.
pub async fn insert_action(
    pool: &DbPool,
    campaign_id: DbId,
    name: &str,
    position: i64,
) -> (DbId, DbId) {
    let config_id: DbId = sqlx::query_scalar(
        "INSERT INTO action_configs (action_type, action_settings, cool_down, max_action_results_per_iteration) \
         VALUES ('VisitAndExtract', '{}', 60000, 10) RETURNING id",
    )
    .fetch_one(pool)
    .await
    .expect("insert config");
    let action_id: DbId = sqlx::query_scalar(
        "INSERT INTO actions (campaign_id, name, position, created_at) \
         VALUES (?, ?, ?, '2024-05-01T10:00:00Z') RETURNING id",
    )
    .bind(campaign_id)
    .bind(name)
    .bind(position)
    .fetch_one(pool)
    .await
    .expect("insert action");
    let version_id = insert_version(pool, action_id, config_id).await;
    (action_id, version_id)
}

pub async fn insert_version(pool: &DbPool, action_id: DbId, config_id: DbId) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO action_versions (action_id, config_id, created_at) \
         VALUES (?, ?, '2024-05-01T10:00:00Z') RETURNING id",
    )
    .bind(action_id)
    .bind(config_id)
    .fetch_one(pool)
    .await
    .expect("insert version")
}

pub async fn insert_result(pool: &DbPool, version_id: DbId, person_id: DbId, result: i64) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO action_results (action_version_id, person_id, result, platform, created_at) \
         VALUES (?, ?, ?, 'linkedin', '2024-05-02T09:30:00Z') RETURNING id",
    )
    .bind(version_id)
    .bind(person_id)
    .bind(result)
    .fetch_one(pool)
    .await
    .expect("insert result")
}

pub async fn exclude_list_count(pool: &DbPool, campaign_id: DbId) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM exclude_lists WHERE campaign_id = ?")
        .bind(campaign_id)
        .fetch_one(pool)
        .await
        .expect("count exclude lists")
}

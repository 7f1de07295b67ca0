//! Campaign action models.
//!
//! An action's behaviour lives in an `action_configs` row, linked
//! through the latest `action_versions` row for that action.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use lhremote_core::types::DbId;

/// Opaque, app-defined action settings.
pub type ActionSettings = serde_json::Map<String, serde_json::Value>;

/// Default pause between two runs of an action, in milliseconds.
pub const DEFAULT_COOL_DOWN_MS: i64 = 60_000;

/// Default cap on results an action produces per iteration.
pub const DEFAULT_MAX_RESULTS_PER_ITERATION: i64 = 10;

/// Joined `actions` + latest `action_versions` + `action_configs` row.
#[derive(Debug, Clone, FromRow)]
pub struct CampaignActionRow {
    pub id: DbId,
    pub campaign_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub config_id: DbId,
    pub action_type: String,
    pub action_settings: String,
    pub cool_down: i64,
    pub max_action_results_per_iteration: i64,
    pub is_draft: bool,
    pub version_id: DbId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionConfig {
    pub id: DbId,
    pub action_type: String,
    pub action_settings: ActionSettings,
    /// Milliseconds.
    pub cool_down: i64,
    pub max_action_results_per_iteration: i64,
    pub is_draft: bool,
}

/// One step of a campaign's action chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignAction {
    pub id: DbId,
    pub campaign_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub config: ActionConfig,
    pub version_id: DbId,
}

impl TryFrom<CampaignActionRow> for CampaignAction {
    type Error = sqlx::Error;

    fn try_from(row: CampaignActionRow) -> Result<Self, Self::Error> {
        let action_settings = if row.action_settings.trim().is_empty() {
            ActionSettings::new()
        } else {
            serde_json::from_str(&row.action_settings)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        };

        Ok(Self {
            id: row.id,
            campaign_id: row.campaign_id,
            name: row.name,
            description: row.description,
            config: ActionConfig {
                id: row.config_id,
                action_type: row.action_type,
                action_settings,
                cool_down: row.cool_down,
                max_action_results_per_iteration: row.max_action_results_per_iteration,
                is_draft: row.is_draft,
            },
            version_id: row.version_id,
        })
    }
}

/// Definition of a new action, used both at campaign creation and when
/// appending to an existing chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateAction {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub action_type: String,
    #[serde(default)]
    pub action_settings: ActionSettings,
    /// Defaults to [`DEFAULT_COOL_DOWN_MS`].
    #[serde(default)]
    pub cool_down: Option<i64>,
    /// Defaults to [`DEFAULT_MAX_RESULTS_PER_ITERATION`].
    #[serde(default)]
    pub max_action_results_per_iteration: Option<i64>,
}

impl CreateAction {
    pub fn resolved_cool_down(&self) -> i64 {
        self.cool_down.unwrap_or(DEFAULT_COOL_DOWN_MS)
    }

    pub fn resolved_max_results(&self) -> i64 {
        self.max_action_results_per_iteration
            .unwrap_or(DEFAULT_MAX_RESULTS_PER_ITERATION)
    }
}

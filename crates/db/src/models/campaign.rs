//! Campaign entity models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use lhremote_core::types::{DbId, Timestamp};

use crate::models::action::CreateAction;

/// LinkedIn account used when a campaign config names none.
pub const DEFAULT_LI_ACCOUNT_ID: DbId = 1;

/// Persisted lifecycle state, derived from the campaign flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignState {
    Active,
    Paused,
    Archived,
    Invalid,
}

impl CampaignState {
    /// Archived wins over invalid, invalid over paused.
    pub fn from_flags(is_paused: bool, is_archived: bool, is_valid: Option<bool>) -> Self {
        if is_archived {
            Self::Archived
        } else if is_valid == Some(false) {
            Self::Invalid
        } else if is_paused {
            Self::Paused
        } else {
            Self::Active
        }
    }
}

/// Raw `campaigns` row.
#[derive(Debug, Clone, FromRow)]
pub struct CampaignRow {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub li_account_id: DbId,
    pub is_paused: bool,
    pub is_archived: bool,
    pub is_valid: Option<bool>,
    pub created_at: Timestamp,
}

/// A campaign as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Campaign {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub state: CampaignState,
    pub li_account_id: DbId,
    pub is_paused: bool,
    pub is_archived: bool,
    /// `None` when the app never set the flag.
    pub is_valid: Option<bool>,
    pub created_at: Timestamp,
}

impl From<CampaignRow> for Campaign {
    fn from(row: CampaignRow) -> Self {
        Self {
            state: CampaignState::from_flags(row.is_paused, row.is_archived, row.is_valid),
            id: row.id,
            name: row.name,
            description: row.description,
            li_account_id: row.li_account_id,
            is_paused: row.is_paused,
            is_archived: row.is_archived,
            is_valid: row.is_valid,
            created_at: row.created_at,
        }
    }
}

/// Campaign definition handed to the app's creation entry point.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaign {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to [`DEFAULT_LI_ACCOUNT_ID`].
    #[serde(default)]
    pub li_account_id: Option<DbId>,
    #[serde(default)]
    pub actions: Vec<CreateAction>,
}

impl CreateCampaign {
    pub fn resolved_li_account_id(&self) -> DbId {
        self.li_account_id.unwrap_or(DEFAULT_LI_ACCOUNT_ID)
    }
}

//! Store traits consumed by the campaign orchestrator.
//!
//! The orchestrator depends on these seams rather than on [`Database`]
//! directly so it can be driven by in-memory fakes. Every method maps
//! repository errors into [`ServiceError::Database`] and reports missing
//! campaigns as [`ServiceError::CampaignNotFound`].

use async_trait::async_trait;
use lhremote_core::error::ServiceError;
use lhremote_core::types::DbId;

use crate::models::action::{CampaignAction, CreateAction};
use crate::models::campaign::Campaign;
use crate::models::result::CampaignActionResult;
use crate::repositories::{CampaignRepo, StatisticsRepo};
use crate::Database;

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn get_campaign(&self, id: DbId) -> Result<Campaign, ServiceError>;

    async fn list_campaigns(&self, include_archived: bool) -> Result<Vec<Campaign>, ServiceError>;

    /// Actions in chain order. Fails with `CampaignNotFound` for an
    /// unknown campaign rather than returning an empty list.
    async fn get_campaign_actions(&self, campaign_id: DbId)
        -> Result<Vec<CampaignAction>, ServiceError>;

    async fn fix_is_valid(&self, campaign_id: DbId) -> Result<(), ServiceError>;

    async fn create_action_exclude_lists(
        &self,
        campaign_id: DbId,
        li_account_id: DbId,
    ) -> Result<(), ServiceError>;

    async fn add_action(
        &self,
        campaign_id: DbId,
        action: &CreateAction,
    ) -> Result<CampaignAction, ServiceError>;

    async fn reset_for_rerun(
        &self,
        campaign_id: DbId,
        person_ids: &[DbId],
    ) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait StatisticsStore: Send + Sync {
    /// Results for every action of the campaign; `CampaignNotFound` for
    /// an unknown campaign.
    async fn get_results(&self, campaign_id: DbId)
        -> Result<Vec<CampaignActionResult>, ServiceError>;
}

fn db_error(e: sqlx::Error) -> ServiceError {
    ServiceError::Database(e.to_string())
}

impl Database {
    async fn require_campaign(&self, id: DbId) -> Result<Campaign, ServiceError> {
        CampaignRepo::find_by_id(self.pool(), id)
            .await
            .map_err(db_error)?
            .ok_or(ServiceError::CampaignNotFound { id })
    }
}

#[async_trait]
impl CampaignStore for Database {
    async fn get_campaign(&self, id: DbId) -> Result<Campaign, ServiceError> {
        self.require_campaign(id).await
    }

    async fn list_campaigns(&self, include_archived: bool) -> Result<Vec<Campaign>, ServiceError> {
        CampaignRepo::list(self.pool(), include_archived)
            .await
            .map_err(db_error)
    }

    async fn get_campaign_actions(
        &self,
        campaign_id: DbId,
    ) -> Result<Vec<CampaignAction>, ServiceError> {
        self.require_campaign(campaign_id).await?;
        CampaignRepo::list_actions(self.pool(), campaign_id)
            .await
            .map_err(db_error)
    }

    async fn fix_is_valid(&self, campaign_id: DbId) -> Result<(), ServiceError> {
        let updated = CampaignRepo::fix_is_valid(self.pool(), campaign_id)
            .await
            .map_err(db_error)?;
        if updated {
            Ok(())
        } else {
            Err(ServiceError::CampaignNotFound { id: campaign_id })
        }
    }

    async fn create_action_exclude_lists(
        &self,
        campaign_id: DbId,
        li_account_id: DbId,
    ) -> Result<(), ServiceError> {
        self.require_campaign(campaign_id).await?;
        let created =
            CampaignRepo::create_action_exclude_lists(self.pool(), campaign_id, li_account_id)
                .await
                .map_err(db_error)?;
        tracing::debug!(campaign_id, li_account_id, created, "Ensured exclude lists");
        Ok(())
    }

    async fn add_action(
        &self,
        campaign_id: DbId,
        action: &CreateAction,
    ) -> Result<CampaignAction, ServiceError> {
        self.require_campaign(campaign_id).await?;
        CampaignRepo::add_action(self.pool(), campaign_id, action)
            .await
            .map_err(db_error)
    }

    async fn reset_for_rerun(
        &self,
        campaign_id: DbId,
        person_ids: &[DbId],
    ) -> Result<(), ServiceError> {
        let removed = CampaignRepo::reset_for_rerun(self.pool(), campaign_id, person_ids)
            .await
            .map_err(db_error)?;
        tracing::debug!(campaign_id, people = person_ids.len(), removed, "Reset results for rerun");
        Ok(())
    }
}

#[async_trait]
impl StatisticsStore for Database {
    async fn get_results(
        &self,
        campaign_id: DbId,
    ) -> Result<Vec<CampaignActionResult>, ServiceError> {
        self.require_campaign(campaign_id).await?;
        StatisticsRepo::list_results(self.pool(), campaign_id)
            .await
            .map_err(db_error)
    }
}

//! Campaign workflow over one instance bridge and its account database.
//!
//! Every operation validates against the database before it touches the
//! bridge, and every bridge failure comes back as
//! [`ServiceError::CampaignExecution`] naming the campaign. Database
//! "not found" errors pass through unchanged.

use std::collections::HashSet;
use std::time::Duration;

use lhremote_cdp::bridge::execute_as;
use lhremote_cdp::command::{
    ActionMove, ActionPeopleCounts, CampaignLiveState, Command, CreatedCampaign, RunnerState,
};
use lhremote_cdp::{Bridge, CdpError};
use lhremote_core::config::ServiceConfig;
use lhremote_core::error::ServiceError;
use lhremote_core::polling::{try_poll_until, PollConfig};
use lhremote_core::types::DbId;
use lhremote_db::models::action::{CampaignAction, CreateAction};
use lhremote_db::models::campaign::{Campaign, CampaignState, CreateCampaign};
use lhremote_db::models::result::CampaignActionResult;
use lhremote_db::store::{CampaignStore, StatisticsStore};
use serde::Serialize;
use serde_json::{json, Value};

/// Idle-wait timings for [`CampaignService::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignConfig {
    pub idle_poll_interval: Duration,
    pub idle_timeout: Duration,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            idle_poll_interval: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&ServiceConfig> for CampaignConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            idle_timeout: config.idle_timeout,
            ..Self::default()
        }
    }
}

/// Persisted and live state of one campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatus {
    pub campaign_id: DbId,
    pub campaign_state: CampaignState,
    pub is_paused: bool,
    pub runner_state: RunnerState,
    pub action_counts: Vec<ActionPeopleCounts>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignResults {
    pub campaign_id: DbId,
    pub results: Vec<CampaignActionResult>,
    pub action_counts: Vec<ActionPeopleCounts>,
}

/// Campaign operations for one connected instance.
pub struct CampaignService<'a> {
    bridge: &'a dyn Bridge,
    campaigns: &'a dyn CampaignStore,
    statistics: &'a dyn StatisticsStore,
    config: CampaignConfig,
}

impl<'a> CampaignService<'a> {
    pub fn new(
        bridge: &'a dyn Bridge,
        campaigns: &'a dyn CampaignStore,
        statistics: &'a dyn StatisticsStore,
    ) -> Self {
        Self {
            bridge,
            campaigns,
            statistics,
            config: CampaignConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CampaignConfig) -> Self {
        self.config = config;
        self
    }

    // ── Catalogue ────────────────────────────────────────────────────

    /// Create a campaign in the app, repair it, and read it back.
    pub async fn create(&self, config: &CreateCampaign) -> Result<Campaign, ServiceError> {
        let li_account_id = config.resolved_li_account_id();
        let command = Command::CreateCampaign {
            payload: campaign_payload(config),
        };
        let created: CreatedCampaign = execute_as(self.bridge, &command)
            .await
            .map_err(|e| ServiceError::CampaignExecution {
                message: format!("Failed to create campaign \"{}\": {e}", config.name),
                campaign_id: None,
            })?;

        // The app can leave a fresh campaign flagged invalid and without
        // exclude lists; both are fixed before anyone reads it.
        self.campaigns.fix_is_valid(created.id).await?;
        self.campaigns
            .create_action_exclude_lists(created.id, li_account_id)
            .await?;

        let campaign = self.campaigns.get_campaign(created.id).await?;
        tracing::info!(campaign_id = campaign.id, name = %campaign.name, "Campaign created");
        Ok(campaign)
    }

    pub async fn list(&self, include_archived: bool) -> Result<Vec<Campaign>, ServiceError> {
        self.campaigns.list_campaigns(include_archived).await
    }

    pub async fn get(&self, id: DbId) -> Result<Campaign, ServiceError> {
        self.campaigns.get_campaign(id).await
    }

    /// Archive the campaign. Nothing is physically deleted.
    pub async fn delete(&self, id: DbId) -> Result<(), ServiceError> {
        self.set_archived(id, true).await
    }

    /// Undo [`delete`](Self::delete).
    pub async fn restore(&self, id: DbId) -> Result<(), ServiceError> {
        self.set_archived(id, false).await
    }

    async fn set_archived(&self, id: DbId, archived: bool) -> Result<(), ServiceError> {
        self.campaigns.get_campaign(id).await?;
        self.remote(id, &Command::SetCampaignArchived { campaign_id: id, archived })
            .await?;
        tracing::info!(campaign_id = id, archived, "Campaign archive flag set");
        Ok(())
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Start running the campaign, optionally re-queueing `person_ids`.
    ///
    /// Waits for the runner to go idle first; never reaching idle is a
    /// [`ServiceError::CampaignTimeout`].
    pub async fn start(&self, id: DbId, person_ids: &[DbId]) -> Result<(), ServiceError> {
        self.campaigns.get_campaign(id).await?;

        if !person_ids.is_empty() {
            self.campaigns.reset_for_rerun(id, person_ids).await?;
        }

        self.wait_for_idle(id).await?;

        self.remote(id, &Command::SetCampaignPaused { campaign_id: id, paused: false })
            .await?;
        self.runner_call(id, &Command::StartRunner { campaign_id: id }).await?;

        tracing::info!(campaign_id = id, rerun = person_ids.len(), "Campaign started");
        Ok(())
    }

    /// Pause the campaign and stop the runner.
    pub async fn stop(&self, id: DbId) -> Result<(), ServiceError> {
        self.campaigns.get_campaign(id).await?;

        self.remote(id, &Command::SetCampaignPaused { campaign_id: id, paused: true })
            .await?;
        self.runner_call(id, &Command::StopRunner).await?;

        tracing::info!(campaign_id = id, "Campaign stopped");
        Ok(())
    }

    async fn wait_for_idle(&self, id: DbId) -> Result<(), ServiceError> {
        let poll = PollConfig::new(self.config.idle_poll_interval, self.config.idle_timeout);
        let bridge = self.bridge;
        let idle = try_poll_until::<(), ServiceError, _, _>(poll, move || async move {
            let state: RunnerState = execute_as(bridge, &Command::GetRunnerState)
                .await
                .map_err(|e| execution_error(id, &Command::GetRunnerState, e))?;
            if state.is_busy() {
                tracing::debug!(campaign_id = id, runner_state = %state, "Runner busy");
                Ok(None)
            } else {
                Ok(Some(()))
            }
        })
        .await?;

        idle.ok_or_else(|| {
            ServiceError::timeout(
                id,
                format!(
                    "runner did not become idle within {}s",
                    self.config.idle_timeout.as_secs()
                ),
            )
        })
    }

    // ── Status ───────────────────────────────────────────────────────

    /// Persisted state combined with the instance's live view.
    ///
    /// The live paused flag decides between active and paused; archived
    /// and invalid campaigns keep their persisted state.
    pub async fn get_status(&self, id: DbId) -> Result<CampaignStatus, ServiceError> {
        let campaign = self.campaigns.get_campaign(id).await?;
        let actions = self.campaigns.get_campaign_actions(id).await?;

        let live_command = Command::GetCampaignLiveState { campaign_id: id };
        let live: CampaignLiveState = execute_as(self.bridge, &live_command)
            .await
            .map_err(|e| execution_error(id, &live_command, e))?;
        let action_counts = self.action_counts(id, &actions).await?;

        let campaign_state = match campaign.state {
            CampaignState::Archived | CampaignState::Invalid => campaign.state,
            CampaignState::Active | CampaignState::Paused if live.is_paused => CampaignState::Paused,
            CampaignState::Active | CampaignState::Paused => CampaignState::Active,
        };

        Ok(CampaignStatus {
            campaign_id: id,
            campaign_state,
            is_paused: live.is_paused,
            runner_state: live.runner_state,
            action_counts,
        })
    }

    pub async fn get_results(&self, id: DbId) -> Result<CampaignResults, ServiceError> {
        let results = self.statistics.get_results(id).await?;
        let actions = self.campaigns.get_campaign_actions(id).await?;
        let action_counts = self.action_counts(id, &actions).await?;

        Ok(CampaignResults {
            campaign_id: id,
            results,
            action_counts,
        })
    }

    /// Live counts for all `actions` in one round trip.
    async fn action_counts(
        &self,
        id: DbId,
        actions: &[CampaignAction],
    ) -> Result<Vec<ActionPeopleCounts>, ServiceError> {
        let command = Command::GetActionCounts {
            campaign_id: id,
            action_ids: actions.iter().map(|a| a.id).collect(),
        };
        match self.remote(id, &command).await? {
            Value::Null => Ok(Vec::new()),
            value => serde_json::from_value(value)
                .map_err(|e| ServiceError::execution(id, format!("Unexpected action counts: {e}"))),
        }
    }

    // ── Action chain ─────────────────────────────────────────────────

    /// Append an action and give it an exclude list.
    pub async fn add_action(
        &self,
        campaign_id: DbId,
        action: &CreateAction,
    ) -> Result<CampaignAction, ServiceError> {
        let campaign = self.campaigns.get_campaign(campaign_id).await?;
        let added = self.campaigns.add_action(campaign_id, action).await?;
        self.campaigns
            .create_action_exclude_lists(campaign_id, campaign.li_account_id)
            .await?;

        tracing::info!(campaign_id, action_id = added.id, "Action added");
        Ok(added)
    }

    pub async fn remove_action(&self, campaign_id: DbId, action_id: DbId) -> Result<(), ServiceError> {
        let actions = self.campaigns.get_campaign_actions(campaign_id).await?;
        if !actions.iter().any(|a| a.id == action_id) {
            return Err(ServiceError::ActionNotFound {
                action_id,
                campaign_id,
            });
        }

        self.remote(
            campaign_id,
            &Command::RemoveActionFromChain {
                campaign_id,
                action_id,
            },
        )
        .await?;

        tracing::info!(campaign_id, action_id, "Action removed");
        Ok(())
    }

    /// Put the chain in the order of `action_ids` and return it as stored.
    pub async fn reorder_actions(
        &self,
        campaign_id: DbId,
        action_ids: &[DbId],
    ) -> Result<Vec<CampaignAction>, ServiceError> {
        let actions = self.campaigns.get_campaign_actions(campaign_id).await?;
        let known: HashSet<DbId> = actions.iter().map(|a| a.id).collect();
        if let Some(&action_id) = action_ids.iter().find(|id| !known.contains(id)) {
            return Err(ServiceError::ActionNotFound {
                action_id,
                campaign_id,
            });
        }

        let moves = action_ids
            .iter()
            .enumerate()
            .map(|(position, &action_id)| ActionMove {
                action_id,
                position,
            })
            .collect();
        self.remote(campaign_id, &Command::MoveActionsInChain { campaign_id, moves })
            .await?;

        self.campaigns.get_campaign_actions(campaign_id).await
    }

    // ---- private helpers ----

    async fn remote(&self, id: DbId, command: &Command) -> Result<Value, ServiceError> {
        self.bridge
            .execute(command)
            .await
            .map_err(|e| execution_error(id, command, e))
    }

    /// Runner calls answer a boolean; `false` is a refusal.
    async fn runner_call(&self, id: DbId, command: &Command) -> Result<(), ServiceError> {
        match self.remote(id, command).await? {
            Value::Bool(false) => Err(ServiceError::execution(
                id,
                format!("{} was refused by the app", command.name()),
            )),
            _ => Ok(()),
        }
    }
}

fn execution_error(id: DbId, command: &Command, err: CdpError) -> ServiceError {
    ServiceError::execution(id, format!("{} failed: {err}", command.name()))
}

/// The app's campaign definition object.
fn campaign_payload(config: &CreateCampaign) -> Value {
    let actions: Vec<Value> = config
        .actions
        .iter()
        .map(|action| {
            json!({
                "name": action.name,
                "description": action.description.clone().unwrap_or_default(),
                "config": {
                    "actionType": action.action_type,
                    "actionSettings": action.action_settings,
                    "coolDown": action.resolved_cool_down(),
                    "maxActionResultsPerIteration": action.resolved_max_results(),
                },
            })
        })
        .collect();

    let mut payload = json!({
        "name": config.name,
        "liAccount": config.resolved_li_account_id(),
        "actions": actions,
    });
    if let Some(description) = &config.description {
        payload["description"] = json!(description);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_applies_action_defaults() {
        let config: CreateCampaign = serde_json::from_value(json!({
            "name": "Outreach",
            "actions": [
                { "name": "Visit", "action_type": "VisitAndExtract" },
                { "name": "Invite", "action_type": "InvitePerson", "cool_down": 5000,
                  "max_action_results_per_iteration": 3 }
            ]
        }))
        .unwrap();

        let payload = campaign_payload(&config);
        assert_eq!(payload["liAccount"], json!(1));
        assert!(payload.get("description").is_none());
        assert_eq!(payload["actions"][0]["config"]["coolDown"], json!(60_000));
        assert_eq!(payload["actions"][0]["config"]["maxActionResultsPerIteration"], json!(10));
        assert_eq!(payload["actions"][1]["config"]["coolDown"], json!(5000));
        assert_eq!(payload["actions"][1]["config"]["maxActionResultsPerIteration"], json!(3));
    }

    #[test]
    fn payload_keeps_explicit_account_and_description() {
        let config: CreateCampaign = serde_json::from_value(json!({
            "name": "Outreach",
            "description": "Q3 founders",
            "li_account_id": 7
        }))
        .unwrap();

        let payload = campaign_payload(&config);
        assert_eq!(payload["liAccount"], json!(7));
        assert_eq!(payload["description"], json!("Q3 founders"));
        assert_eq!(payload["actions"], json!([]));
    }
}

//! Every expression this workspace evaluates inside the app.
//!
//! Launcher commands run in the launcher window, which has Node
//! integration and reaches the main process through `ipcRenderer`.
//! Instance commands run in an account's instance window and go through
//! the `mainWindowService` the app installs on `window`. Arguments are
//! always embedded as JSON literals.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use lhremote_core::types::DbId;

/// A remote call, rendered to expression text by [`Command::expression`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // ── Launcher ─────────────────────────────────────────────────────
    StartInstance { account_id: DbId },
    StopInstance { account_id: DbId },
    GetInstanceStatus { account_id: DbId },
    ListAccounts,

    // ── Instance ─────────────────────────────────────────────────────
    /// `payload` is the app's campaign definition object.
    CreateCampaign { payload: Value },
    SetCampaignArchived { campaign_id: DbId, archived: bool },
    GetRunnerState,
    GetCampaignLiveState { campaign_id: DbId },
    SetCampaignPaused { campaign_id: DbId, paused: bool },
    StartRunner { campaign_id: DbId },
    StopRunner,
    RemoveActionFromChain { campaign_id: DbId, action_id: DbId },
    MoveActionsInChain { campaign_id: DbId, moves: Vec<ActionMove> },
    GetActionCounts { campaign_id: DbId, action_ids: Vec<DbId> },
}

impl Command {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartInstance { .. } => "start-instance",
            Self::StopInstance { .. } => "stop-instance",
            Self::GetInstanceStatus { .. } => "get-instance-status",
            Self::ListAccounts => "get-accounts",
            Self::CreateCampaign { .. } => "createCampaign",
            Self::SetCampaignArchived { .. } => "setCampaignArchived",
            Self::GetRunnerState => "getRunnerState",
            Self::GetCampaignLiveState { .. } => "getCampaignState",
            Self::SetCampaignPaused { .. } => "setCampaignPaused",
            Self::StartRunner { .. } => "startCampaign",
            Self::StopRunner => "stopRunner",
            Self::RemoveActionFromChain { .. } => "removeActionFromChain",
            Self::MoveActionsInChain { .. } => "moveActionsInChain",
            Self::GetActionCounts { .. } => "getActionsPeopleCounts",
        }
    }

    /// Whether this command targets the launcher rather than an instance.
    pub fn is_launcher_command(&self) -> bool {
        matches!(
            self,
            Self::StartInstance { .. }
                | Self::StopInstance { .. }
                | Self::GetInstanceStatus { .. }
                | Self::ListAccounts
        )
    }

    /// The JavaScript expression to evaluate.
    pub fn expression(&self) -> String {
        let name = self.name();
        match self {
            Self::StartInstance { account_id }
            | Self::StopInstance { account_id }
            | Self::GetInstanceStatus { account_id } => {
                ipc(name, &json!({ "linkedInAccountId": account_id }))
            }
            Self::ListAccounts => ipc(name, &Value::Null),

            Self::CreateCampaign { payload } => service(name, &[payload.clone()]),
            Self::SetCampaignArchived { campaign_id, archived } => {
                service(name, &[json!(campaign_id), json!(archived)])
            }
            Self::GetRunnerState | Self::StopRunner => service(name, &[]),
            Self::GetCampaignLiveState { campaign_id } | Self::StartRunner { campaign_id } => {
                service(name, &[json!(campaign_id)])
            }
            Self::SetCampaignPaused { campaign_id, paused } => {
                service(name, &[json!(campaign_id), json!(paused)])
            }
            Self::RemoveActionFromChain { campaign_id, action_id } => {
                service(name, &[json!(campaign_id), json!(action_id)])
            }
            Self::MoveActionsInChain { campaign_id, moves } => {
                service(name, &[json!(campaign_id), json!(moves)])
            }
            Self::GetActionCounts { campaign_id, action_ids } => {
                service(name, &[json!(campaign_id), json!(action_ids)])
            }
        }
    }
}

fn ipc(channel: &str, payload: &Value) -> String {
    format!(
        "(async () => await require('electron').ipcRenderer.invoke({}, {payload}))()",
        Value::from(channel)
    )
}

fn service(method: &str, args: &[Value]) -> String {
    format!(
        "(async () => await window.mainWindowService.call({}, {}))()",
        Value::from(method),
        Value::from(args.to_vec())
    )
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Live state of the app's campaign runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunnerState {
    Idle,
    Campaigns,
    StoppingCampaigns,
    /// A state this crate does not know, kept verbatim.
    Other(String),
}

impl RunnerState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Campaigns => "campaigns",
            Self::StoppingCampaigns => "stopping-campaigns",
            Self::Other(s) => s,
        }
    }

    /// Anything but `idle` blocks starting a campaign.
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl From<String> for RunnerState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "idle" => Self::Idle,
            "campaigns" => Self::Campaigns,
            "stopping-campaigns" => Self::StoppingCampaigns,
            _ => Self::Other(s),
        }
    }
}

impl From<RunnerState> for String {
    fn from(state: RunnerState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for RunnerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paused flag and runner state as the instance sees them now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignLiveState {
    pub is_paused: bool,
    pub runner_state: RunnerState,
}

/// Live progress counters for one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPeopleCounts {
    pub action_id: DbId,
    #[serde(default)]
    pub queued: i64,
    #[serde(default)]
    pub processed: i64,
    #[serde(default)]
    pub successful: i64,
    #[serde(default)]
    pub failed: i64,
}

/// Move `action_id` to `position` in its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMove {
    pub action_id: DbId,
    pub position: usize,
}

/// Reply of the campaign creation entry point.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedCampaign {
    pub id: DbId,
}

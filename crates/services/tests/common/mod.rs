//! Recording fakes for the bridge, stores, launcher and port discovery.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use lhremote_cdp::command::Command;
use lhremote_cdp::discovery::PortDiscovery;
use lhremote_cdp::launcher::InstanceLauncher;
use lhremote_cdp::{Bridge, CdpError};
use lhremote_core::error::ServiceError;
use lhremote_core::types::DbId;
use lhremote_db::models::action::{ActionConfig, CampaignAction, CreateAction};
use lhremote_db::models::campaign::{Campaign, CampaignState};
use lhremote_db::models::result::CampaignActionResult;
use lhremote_db::store::{CampaignStore, StatisticsStore};
use serde_json::Value;

/// Shared, ordered record of what the fakes were asked to do.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

type Responder = Box<dyn Fn(&Command) -> Result<Value, CdpError> + Send + Sync>;

pub struct FakeBridge {
    calls: Mutex<Vec<Command>>,
    respond: Responder,
}

impl FakeBridge {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&Command) -> Result<Value, CdpError> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Answers `"idle"` to runner-state queries and `true` to everything else.
    pub fn cooperative() -> Self {
        Self::new(|command| {
            Ok(match command {
                Command::GetRunnerState => Value::from("idle"),
                _ => Value::Bool(true),
            })
        })
    }

    pub fn calls(&self) -> Vec<Command> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.name() == name).count()
    }
}

#[async_trait]
impl Bridge for FakeBridge {
    async fn execute(&self, command: &Command) -> Result<Value, CdpError> {
        self.calls.lock().unwrap().push(command.clone());
        (self.respond)(command)
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

pub fn campaign(id: DbId, is_paused: bool) -> Campaign {
    Campaign {
        id,
        name: format!("Campaign {id}"),
        description: None,
        state: CampaignState::from_flags(is_paused, false, Some(true)),
        li_account_id: 1,
        is_paused,
        is_archived: false,
        is_valid: Some(true),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
    }
}

pub fn action(id: DbId, campaign_id: DbId) -> CampaignAction {
    CampaignAction {
        id,
        campaign_id,
        name: format!("Action {id}"),
        description: None,
        config: ActionConfig {
            id: id * 10,
            action_type: "VisitAndExtract".into(),
            action_settings: Default::default(),
            cool_down: 60_000,
            max_action_results_per_iteration: 10,
            is_draft: false,
        },
        version_id: id * 100,
    }
}

#[derive(Default)]
pub struct FakeStore {
    campaigns: Mutex<HashMap<DbId, Campaign>>,
    actions: Mutex<HashMap<DbId, Vec<CampaignAction>>>,
    results: Mutex<HashMap<DbId, Vec<CampaignActionResult>>>,
    pub log: Log,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_campaign(self, campaign: Campaign, actions: Vec<CampaignAction>) -> Self {
        self.actions.lock().unwrap().insert(campaign.id, actions);
        self.campaigns.lock().unwrap().insert(campaign.id, campaign);
        self
    }

    pub fn with_results(self, campaign_id: DbId, results: Vec<CampaignActionResult>) -> Self {
        self.results.lock().unwrap().insert(campaign_id, results);
        self
    }

    pub fn log(&self) -> Vec<String> {
        entries(&self.log)
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn require(&self, id: DbId) -> Result<Campaign, ServiceError> {
        self.campaigns
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(ServiceError::CampaignNotFound { id })
    }
}

#[async_trait]
impl CampaignStore for FakeStore {
    async fn get_campaign(&self, id: DbId) -> Result<Campaign, ServiceError> {
        self.record(format!("get_campaign:{id}"));
        self.require(id)
    }

    async fn list_campaigns(&self, include_archived: bool) -> Result<Vec<Campaign>, ServiceError> {
        self.record(format!("list_campaigns:{include_archived}"));
        let mut all: Vec<Campaign> = self
            .campaigns
            .lock()
            .unwrap()
            .values()
            .filter(|c| include_archived || !c.is_archived)
            .cloned()
            .collect();
        all.sort_by_key(|c| c.id);
        Ok(all)
    }

    async fn get_campaign_actions(&self, campaign_id: DbId) -> Result<Vec<CampaignAction>, ServiceError> {
        self.record(format!("get_campaign_actions:{campaign_id}"));
        self.require(campaign_id)?;
        Ok(self
            .actions
            .lock()
            .unwrap()
            .get(&campaign_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fix_is_valid(&self, campaign_id: DbId) -> Result<(), ServiceError> {
        self.record(format!("fix_is_valid:{campaign_id}"));
        let mut campaigns = self.campaigns.lock().unwrap();
        let campaign = campaigns
            .get_mut(&campaign_id)
            .ok_or(ServiceError::CampaignNotFound { id: campaign_id })?;
        campaign.is_valid = Some(true);
        campaign.state =
            CampaignState::from_flags(campaign.is_paused, campaign.is_archived, campaign.is_valid);
        Ok(())
    }

    async fn create_action_exclude_lists(
        &self,
        campaign_id: DbId,
        li_account_id: DbId,
    ) -> Result<(), ServiceError> {
        self.record(format!("create_action_exclude_lists:{campaign_id}:{li_account_id}"));
        self.require(campaign_id).map(|_| ())
    }

    async fn add_action(
        &self,
        campaign_id: DbId,
        input: &CreateAction,
    ) -> Result<CampaignAction, ServiceError> {
        self.record(format!("add_action:{campaign_id}:{}", input.name));
        self.require(campaign_id)?;
        let mut actions = self.actions.lock().unwrap();
        let chain = actions.entry(campaign_id).or_default();
        let mut added = action(chain.iter().map(|a| a.id).max().unwrap_or(0) + 1, campaign_id);
        added.name = input.name.clone();
        added.config.action_type = input.action_type.clone();
        added.config.cool_down = input.resolved_cool_down();
        added.config.max_action_results_per_iteration = input.resolved_max_results();
        chain.push(added.clone());
        Ok(added)
    }

    async fn reset_for_rerun(&self, campaign_id: DbId, person_ids: &[DbId]) -> Result<(), ServiceError> {
        self.record(format!("reset_for_rerun:{campaign_id}:{person_ids:?}"));
        Ok(())
    }
}

#[async_trait]
impl StatisticsStore for FakeStore {
    async fn get_results(&self, campaign_id: DbId) -> Result<Vec<CampaignActionResult>, ServiceError> {
        self.record(format!("get_results:{campaign_id}"));
        self.require(campaign_id)?;
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(&campaign_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Launcher and discovery
// ---------------------------------------------------------------------------

/// Pops a scripted answer per `start_instance`; `stop_instance` succeeds.
pub struct FakeLauncher {
    starts: Mutex<VecDeque<Result<(), ServiceError>>>,
    pub log: Log,
}

impl FakeLauncher {
    pub fn new(starts: Vec<Result<(), ServiceError>>) -> Self {
        Self {
            starts: Mutex::new(starts.into()),
            log: Log::default(),
        }
    }

    pub fn log(&self) -> Vec<String> {
        entries(&self.log)
    }
}

#[async_trait]
impl InstanceLauncher for FakeLauncher {
    async fn start_instance(&self, account_id: DbId) -> Result<(), ServiceError> {
        self.log.lock().unwrap().push(format!("start:{account_id}"));
        self.starts.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn stop_instance(&self, account_id: DbId) -> Result<(), ServiceError> {
        self.log.lock().unwrap().push(format!("stop:{account_id}"));
        Ok(())
    }
}

pub fn already_running(account_id: DbId) -> ServiceError {
    ServiceError::StartInstance {
        account_id,
        reason: "account is already running".into(),
    }
}

/// Answers from a script; the last answer repeats.
pub struct FakeDiscovery {
    answers: Mutex<VecDeque<Option<u16>>>,
    last: Mutex<Option<u16>>,
    calls: AtomicUsize,
}

impl FakeDiscovery {
    pub fn new(answers: Vec<Option<u16>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortDiscovery for FakeDiscovery {
    async fn discover_instance_port(&self, _launcher_port: u16) -> Result<Option<u16>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(answer) = self.answers.lock().unwrap().pop_front() {
            *last = answer;
        }
        Ok(*last)
    }
}

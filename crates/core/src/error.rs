use crate::types::DbId;

/// Name of the environment variable that overrides the app executable path.
pub const APP_PATH_ENV: &str = "LINKEDHELPER_PATH";

/// Every failure surfaced by the `lhremote` services.
///
/// Database "not found" variants are passed through orchestration
/// unchanged; raw bridge failures are normalized into
/// [`CampaignExecution`](Self::CampaignExecution) or
/// [`CampaignTimeout`](Self::CampaignTimeout) by the campaign service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("LinkedHelper executable not found; set {env_var} to its path")]
    AppNotFound { env_var: &'static str },

    #[error("Failed to launch LinkedHelper: {reason}")]
    AppLaunch {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("LinkedHelper is not running (nothing listening on debug port {port})")]
    NotRunning { port: u16 },

    #[error("Not connected to the debug bridge")]
    NotConnected,

    #[error("Failed to start instance for account {account_id}: {reason}")]
    StartInstance { account_id: DbId, reason: String },

    #[error("Port {port} is not the LinkedHelper launcher endpoint")]
    WrongPort { port: u16 },

    #[error("No LinkedHelper instance is running (launcher port {launcher_port})")]
    InstanceNotRunning { launcher_port: u16 },

    #[error("Database for account {account_id} not found")]
    DatabaseNotFound { account_id: DbId },

    #[error("Campaign {id} not found")]
    CampaignNotFound { id: DbId },

    #[error("Action {action_id} not found in campaign {campaign_id}")]
    ActionNotFound { action_id: DbId, campaign_id: DbId },

    #[error("Campaign execution failed: {message}")]
    CampaignExecution {
        message: String,
        campaign_id: Option<DbId>,
    },

    #[error("Campaign timed out: {message}")]
    CampaignTimeout {
        message: String,
        campaign_id: Option<DbId>,
    },

    /// An evaluation failure from the bridge that no caller remapped.
    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn app_launch(reason: impl Into<String>) -> Self {
        Self::AppLaunch {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn execution(campaign_id: DbId, message: impl Into<String>) -> Self {
        Self::CampaignExecution {
            message: message.into(),
            campaign_id: Some(campaign_id),
        }
    }

    pub fn timeout(campaign_id: DbId, message: impl Into<String>) -> Self {
        Self::CampaignTimeout {
            message: message.into(),
            campaign_id: Some(campaign_id),
        }
    }
}

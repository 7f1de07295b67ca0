//! The launcher endpoint: the app's main debug port.
//!
//! [`RemoteLauncher`] holds one session with the launcher window and
//! starts, stops and queries per-account instances through it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use lhremote_core::error::ServiceError;
use lhremote_core::types::DbId;

use crate::client::{CdpClient, DEFAULT_CALL_TIMEOUT};
use crate::command::Command;
use crate::error::CdpError;

/// Evaluation failure text seen when the port belongs to a window without
/// Node integration (an instance, or some other Chromium), not the launcher.
pub const WRONG_PORT_PATTERN: &str = "require is not defined";

/// A LinkedIn account configured in the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: DbId,
    pub li_id: DbId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Launcher's view of one account's instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceStatus {
    Running,
    Starting,
    Stopping,
    Stopped,
    Other(String),
}

impl From<String> for InstanceStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "running" => Self::Running,
            "starting" => Self::Starting,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            _ => Self::Other(s),
        }
    }
}

impl From<InstanceStatus> for String {
    fn from(status: InstanceStatus) -> Self {
        match status {
            InstanceStatus::Running => "running".into(),
            InstanceStatus::Starting => "starting".into(),
            InstanceStatus::Stopping => "stopping".into(),
            InstanceStatus::Stopped => "stopped".into(),
            InstanceStatus::Other(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StartOutcome {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Starting and stopping instances, as needed by crash recovery.
#[async_trait]
pub trait InstanceLauncher: Send + Sync {
    async fn start_instance(&self, account_id: DbId) -> Result<(), ServiceError>;
    async fn stop_instance(&self, account_id: DbId) -> Result<(), ServiceError>;
}

/// Session with the launcher window on the app's main debug port.
pub struct RemoteLauncher {
    port: u16,
    evaluate_timeout: Duration,
    client: Option<CdpClient>,
}

impl RemoteLauncher {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            evaluate_timeout: DEFAULT_CALL_TIMEOUT,
            client: None,
        }
    }

    pub fn with_evaluate_timeout(mut self, timeout: Duration) -> Self {
        self.evaluate_timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Attach to the launcher window. A refused connection means the app
    /// is not running on this port.
    pub async fn connect(&mut self) -> Result<(), ServiceError> {
        if self.client.is_some() {
            return Ok(());
        }

        let client = CdpClient::connect_to_page(self.port, self.evaluate_timeout)
            .await
            .map_err(|e| match e {
                CdpError::ConnectionRefused { .. } => ServiceError::NotRunning { port: self.port },
                other => ServiceError::from(other),
            })?;

        tracing::info!(port = self.port, "Connected to launcher");
        self.client = Some(client);
        Ok(())
    }

    /// Drop the session. No-op when not connected.
    pub async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            client.close().await;
            tracing::debug!(port = self.port, "Disconnected from launcher");
        }
    }

    pub async fn get_instance_status(&self, account_id: DbId) -> Result<InstanceStatus, ServiceError> {
        let value = self.run(&Command::GetInstanceStatus { account_id }).await?;
        decode(value)
    }

    /// Accounts configured in the app; empty when it reports none.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, ServiceError> {
        match self.run(&Command::ListAccounts).await? {
            Value::Null => Ok(Vec::new()),
            value => decode(value),
        }
    }

    async fn run(&self, command: &Command) -> Result<Value, ServiceError> {
        if !command.is_launcher_command() {
            return Err(ServiceError::Bridge(format!(
                "{} must be sent to an instance, not the launcher",
                command.name()
            )));
        }
        let client = self.client.as_ref().ok_or(ServiceError::NotConnected)?;
        tracing::debug!(port = self.port, command = command.name(), "Launcher command");
        client
            .evaluate(&command.expression())
            .await
            .map_err(|e| map_launcher_error(self.port, e))
    }
}

#[async_trait]
impl InstanceLauncher for RemoteLauncher {
    async fn start_instance(&self, account_id: DbId) -> Result<(), ServiceError> {
        let value = self.run(&Command::StartInstance { account_id }).await?;
        check_start_outcome(account_id, value)
    }

    async fn stop_instance(&self, account_id: DbId) -> Result<(), ServiceError> {
        self.run(&Command::StopInstance { account_id }).await?;
        tracing::info!(account_id, "Requested instance stop");
        Ok(())
    }
}

/// Whether an evaluation failure means we are attached to the wrong port.
///
/// Substring match on the engine's reference-error text; the message is
/// not a stable contract of the app.
pub fn is_wrong_port(message: &str) -> bool {
    message.contains(WRONG_PORT_PATTERN)
}

fn map_launcher_error(port: u16, err: CdpError) -> ServiceError {
    match err.evaluation_message() {
        Some(message) if is_wrong_port(message) => ServiceError::WrongPort { port },
        _ => err.into(),
    }
}

fn check_start_outcome(account_id: DbId, value: Value) -> Result<(), ServiceError> {
    let outcome: StartOutcome = decode(value)?;
    if outcome.success {
        tracing::info!(account_id, "Instance start accepted");
        Ok(())
    } else {
        Err(ServiceError::StartInstance {
            account_id,
            reason: outcome.error.unwrap_or_else(|| "unknown error".into()),
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ServiceError> {
    serde_json::from_value(value).map_err(|e| ServiceError::Bridge(format!("Unexpected launcher reply: {e}")))
}

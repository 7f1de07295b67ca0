//! Session with one account's instance window.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use lhremote_core::error::ServiceError;

use crate::bridge::Bridge;
use crate::client::{CdpClient, DEFAULT_CALL_TIMEOUT};
use crate::command::Command;
use crate::error::CdpError;

/// Bridge to a running instance on its own debug port.
pub struct InstanceBridge {
    port: u16,
    evaluate_timeout: Duration,
    client: Option<CdpClient>,
}

impl InstanceBridge {
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

    pub async fn connect(&mut self) -> Result<(), ServiceError> {
        if self.client.is_some() {
            return Ok(());
        }
        let client = CdpClient::connect_to_page(self.port, self.evaluate_timeout).await?;
        tracing::info!(port = self.port, "Connected to instance");
        self.client = Some(client);
        Ok(())
    }

    /// Drop the session. No-op when not connected.
    pub async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            client.close().await;
            tracing::debug!(port = self.port, "Disconnected from instance");
        }
    }
}

#[async_trait]
impl Bridge for InstanceBridge {
    async fn execute(&self, command: &Command) -> Result<Value, CdpError> {
        if command.is_launcher_command() {
            return Err(CdpError::Protocol(format!(
                "{} must be sent to the launcher, not an instance",
                command.name()
            )));
        }
        let client = self.client.as_ref().ok_or(CdpError::NotConnected)?;
        tracing::debug!(port = self.port, command = command.name(), "Instance command");
        client.evaluate(&command.expression()).await
    }
}

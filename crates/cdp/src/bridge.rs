//! The seam between the services and a connected debug endpoint.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::command::Command;
use crate::error::CdpError;

/// Something that can evaluate [`Command`]s and hand back their JSON
/// result. Implemented by [`InstanceBridge`](crate::instance::InstanceBridge);
/// tests substitute recording fakes.
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn execute(&self, command: &Command) -> Result<Value, CdpError>;
}

/// Execute `command` and deserialize its result.
pub async fn execute_as<T, B>(bridge: &B, command: &Command) -> Result<T, CdpError>
where
    T: DeserializeOwned,
    B: Bridge + ?Sized,
{
    let value = bridge.execute(command).await?;
    serde_json::from_value(value).map_err(|e| {
        CdpError::Protocol(format!("Unexpected result from {}: {e}", command.name()))
    })
}

//! Starting account instances, with crash recovery.
//!
//! When the launcher says an account is "already running" we look for
//! its debug port. Found means it really runs and we leave it alone. Not
//! found means the launcher is holding state from a crashed instance: we
//! stop it, let it settle, and start once more.
//!
//! The sequence is a small state machine: [`transition`] is pure, and
//! [`start_instance_with_recovery`] performs the effect each state calls
//! for and feeds the result back in as an event.

use std::time::Duration;

use lhremote_cdp::discovery::PortDiscovery;
use lhremote_cdp::launcher::InstanceLauncher;
use lhremote_core::config::ServiceConfig;
use lhremote_core::error::ServiceError;
use lhremote_core::polling::{poll_until, PollConfig};
use lhremote_core::types::DbId;
use serde::Serialize;

/// Polling and settle timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub poll_interval: Duration,
    /// Deadline for a started instance to expose its port.
    pub port_timeout: Duration,
    /// Deadline for a stopped instance to drop its port.
    pub shutdown_timeout: Duration,
    /// Pause between stopping a crashed instance and restarting it.
    pub settle_delay: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            port_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_millis(2000),
        }
    }
}

impl From<&ServiceConfig> for LifecycleConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            port_timeout: config.instance_port_timeout,
            shutdown_timeout: config.shutdown_timeout,
            settle_delay: config.settle_delay,
            ..Self::default()
        }
    }
}

/// How an idempotent start ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartInstanceOutcome {
    /// It was already up; nothing was touched.
    AlreadyRunning { port: u16 },
    Started { port: u16 },
    /// Start was accepted but no port appeared before the deadline.
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Idle,
    /// Issuing a start; `recovered` once the crash cycle has run.
    Starting { recovered: bool },
    RecoveringFromCrash,
    AwaitingPort,
    AlreadyRunningConfirmed { port: u16 },
    Started { port: u16 },
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryEvent {
    Begin,
    StartAccepted,
    /// Start refused as "already running"; carries what discovery found.
    AlreadyRunning { discovered_port: Option<u16> },
    /// Stop issued and settle delay elapsed.
    Restart,
    PortReady(Option<u16>),
}

/// Next state, or `None` when `event` is not valid in `state`.
///
/// An "already running" refusal after recovery has no transition: the
/// caller propagates it.
pub fn transition(state: RecoveryState, event: RecoveryEvent) -> Option<RecoveryState> {
    use RecoveryEvent as E;
    use RecoveryState as S;

    match (state, event) {
        (S::Idle, E::Begin) => Some(S::Starting { recovered: false }),
        (S::Starting { .. }, E::StartAccepted) => Some(S::AwaitingPort),
        (S::Starting { recovered: false }, E::AlreadyRunning { discovered_port: Some(port) }) => {
            Some(S::AlreadyRunningConfirmed { port })
        }
        (S::Starting { recovered: false }, E::AlreadyRunning { discovered_port: None }) => {
            Some(S::RecoveringFromCrash)
        }
        (S::RecoveringFromCrash, E::Restart) => Some(S::Starting { recovered: true }),
        (S::AwaitingPort, E::PortReady(Some(port))) => Some(S::Started { port }),
        (S::AwaitingPort, E::PortReady(None)) => Some(S::TimedOut),
        _ => None,
    }
}

/// Whether a start failure is the launcher's "already running" refusal.
pub fn is_already_running(err: &ServiceError) -> bool {
    match err {
        ServiceError::StartInstance { reason, .. } => {
            reason.to_lowercase().contains("already running")
        }
        _ => false,
    }
}

/// Start `account_id`'s instance, recovering once from a stale crash.
pub async fn start_instance_with_recovery<L, D>(
    launcher: &L,
    discovery: &D,
    account_id: DbId,
    launcher_port: u16,
    config: &LifecycleConfig,
) -> Result<StartInstanceOutcome, ServiceError>
where
    L: InstanceLauncher + ?Sized,
    D: PortDiscovery + ?Sized,
{
    let mut state = RecoveryState::Idle;

    loop {
        let event = match state {
            RecoveryState::Idle => RecoveryEvent::Begin,
            RecoveryState::Starting { .. } => match launcher.start_instance(account_id).await {
                Ok(()) => RecoveryEvent::StartAccepted,
                Err(err) if is_already_running(&err) => {
                    let discovered_port = discovery.discover_instance_port(launcher_port).await?;
                    let event = RecoveryEvent::AlreadyRunning { discovered_port };
                    match transition(state, event) {
                        Some(next) => {
                            state = next;
                            continue;
                        }
                        None => return Err(err),
                    }
                }
                Err(err) => return Err(err),
            },
            RecoveryState::RecoveringFromCrash => {
                tracing::warn!(account_id, "Instance reported running but has no port, restarting");
                launcher.stop_instance(account_id).await?;
                tokio::time::sleep(config.settle_delay).await;
                RecoveryEvent::Restart
            }
            RecoveryState::AwaitingPort => {
                RecoveryEvent::PortReady(wait_for_instance_port(discovery, launcher_port, config).await)
            }
            RecoveryState::AlreadyRunningConfirmed { port } => {
                tracing::info!(account_id, port, "Instance already running");
                return Ok(StartInstanceOutcome::AlreadyRunning { port });
            }
            RecoveryState::Started { port } => {
                tracing::info!(account_id, port, "Instance started");
                return Ok(StartInstanceOutcome::Started { port });
            }
            RecoveryState::TimedOut => {
                tracing::warn!(account_id, "Instance started but exposed no port in time");
                return Ok(StartInstanceOutcome::Timeout);
            }
        };

        state = transition(state, event).ok_or_else(|| ServiceError::StartInstance {
            account_id,
            reason: format!("unexpected {event:?} while {state:?}"),
        })?;
    }
}

/// Poll until an instance port shows up. `None` after the deadline.
pub async fn wait_for_instance_port<D>(
    discovery: &D,
    launcher_port: u16,
    config: &LifecycleConfig,
) -> Option<u16>
where
    D: PortDiscovery + ?Sized,
{
    poll_until(PollConfig::new(config.poll_interval, config.port_timeout), move || {
        discover(discovery, launcher_port)
    })
    .await
}

/// Poll until no instance port is discoverable. Returns whether that
/// happened before the deadline.
pub async fn wait_for_instance_shutdown<D>(
    discovery: &D,
    launcher_port: u16,
    config: &LifecycleConfig,
) -> bool
where
    D: PortDiscovery + ?Sized,
{
    let gone = poll_until(
        PollConfig::new(config.poll_interval, config.shutdown_timeout),
        move || async move {
            match discovery.discover_instance_port(launcher_port).await {
                Ok(None) => Some(()),
                Ok(Some(_)) => None,
                Err(e) => {
                    tracing::debug!(launcher_port, error = %e, "Port discovery failed");
                    None
                }
            }
        },
    )
    .await;
    gone.is_some()
}

/// Discovery errors count as "not yet".
async fn discover<D>(discovery: &D, launcher_port: u16) -> Option<u16>
where
    D: PortDiscovery + ?Sized,
{
    match discovery.discover_instance_port(launcher_port).await {
        Ok(port) => port,
        Err(e) => {
            tracing::debug!(launcher_port, error = %e, "Port discovery failed");
            None
        }
    }
}

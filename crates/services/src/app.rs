//! Supervision of the LinkedHelper process.
//!
//! [`AppService`] launches the app detached with a debug port, tells
//! whether it is up, and shuts it down (signal first, kill later). An app
//! that was already running when we attached is closed through the
//! bridge instead.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use lhremote_cdp::api::CdpApi;
use lhremote_cdp::client::close_browser;
use lhremote_cdp::discovery::free_port;
use lhremote_core::config::{ServiceConfig, DEFAULT_PROBE_DELAY_MS};
use lhremote_core::error::{ServiceError, APP_PATH_ENV};
use tokio::process::{Child, Command};

/// Timing knobs for launch and shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// How long the process must survive before launch counts as good.
    pub probe_delay: Duration,
    /// Wait after SIGTERM before escalating to a kill.
    pub graceful_timeout: Duration,
    /// Wait after the kill before giving up.
    pub kill_timeout: Duration,
    /// Bound on the bridge round trip used to close an unowned app.
    pub evaluate_timeout: Duration,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            probe_delay: Duration::from_millis(DEFAULT_PROBE_DELAY_MS),
            graceful_timeout: Duration::from_secs(10),
            kill_timeout: Duration::from_secs(5),
            evaluate_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ServiceConfig> for LaunchConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            probe_delay: config.probe_delay,
            graceful_timeout: config.graceful_timeout,
            kill_timeout: config.kill_timeout,
            evaluate_timeout: config.evaluate_timeout,
        }
    }
}

/// The app's OS process and its launcher debug port.
pub struct AppService {
    port: Option<u16>,
    app_path: Option<PathBuf>,
    config: LaunchConfig,
    child: Option<Child>,
}

impl AppService {
    /// Supervise the app on `port`, or on a free port picked at launch.
    pub fn new(port: Option<u16>) -> Self {
        Self {
            port,
            app_path: None,
            config: LaunchConfig::default(),
            child: None,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            port: config.launcher_port,
            app_path: config.app_path.clone(),
            config: LaunchConfig::from(config),
            child: None,
        }
    }

    /// Override the executable (takes precedence over the platform default).
    pub fn with_app_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.app_path = Some(path.into());
        self
    }

    pub fn with_launch_config(mut self, config: LaunchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Whether we spawned the running process ourselves.
    pub fn owns_process(&self) -> bool {
        self.child.is_some()
    }

    /// Start the app unless it already answers on its port. Returns the
    /// launcher port.
    pub async fn launch(&mut self) -> Result<u16, ServiceError> {
        if let Some(port) = self.port {
            if self.is_running().await {
                tracing::debug!(port, "App already running");
                return Ok(port);
            }
            // Ours but not answering yet (slow start); spawning again would
            // orphan it.
            if self.owned_child_alive() {
                tracing::debug!(port, "Launched app still starting");
                return Ok(port);
            }
        }

        let port = match self.port {
            Some(port) => port,
            None => free_port()?,
        };
        let executable = resolve_executable(self.app_path.as_deref(), platform_default_path().as_deref())?;

        let mut command = Command::new(&executable);
        command
            .arg(format!("--remote-debugging-port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // Own process group so the app outlives a Ctrl-C aimed at us.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| ServiceError::AppLaunch {
            reason: format!("failed to spawn {}", executable.display()),
            source: Some(e),
        })?;

        tokio::select! {
            status = child.wait() => {
                return Err(match status {
                    Ok(status) => ServiceError::app_launch(format!("process exited during startup ({status})")),
                    Err(e) => ServiceError::AppLaunch {
                        reason: "failed waiting on process".into(),
                        source: Some(e),
                    },
                });
            }
            _ = tokio::time::sleep(self.config.probe_delay) => {}
        }

        tracing::info!(
            port,
            pid = child.id(),
            executable = %executable.display(),
            "Launched LinkedHelper",
        );
        self.port = Some(port);
        self.child = Some(child);
        Ok(port)
    }

    /// Whether the process we spawned is still alive. Forgets it once it
    /// has exited.
    fn owned_child_alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::info!(port = self.port, %status, "LinkedHelper exited on its own");
                self.child = None;
                false
            }
            Err(e) => {
                tracing::warn!(port = self.port, error = %e, "Failed to poll LinkedHelper process");
                true
            }
        }
    }

    /// Whether the debug port answers. Never fails.
    pub async fn is_running(&self) -> bool {
        match self.port {
            Some(port) => CdpApi::new(port).probe().await,
            None => false,
        }
    }

    /// Shut the app down. Gives up silently once the timeouts pass.
    pub async fn quit(&mut self) {
        let Some(mut child) = self.child.take() else {
            self.close_unowned().await;
            return;
        };

        terminate(&mut child);
        if tokio::time::timeout(self.config.graceful_timeout, child.wait())
            .await
            .is_ok()
        {
            tracing::info!(port = self.port, "LinkedHelper exited");
            return;
        }

        tracing::warn!(
            port = self.port,
            timeout_ms = self.config.graceful_timeout.as_millis() as u64,
            "LinkedHelper ignored SIGTERM, killing",
        );
        if let Err(e) = child.start_kill() {
            tracing::warn!(error = %e, "Failed to kill LinkedHelper");
        }
        if tokio::time::timeout(self.config.kill_timeout, child.wait())
            .await
            .is_err()
        {
            tracing::warn!(port = self.port, "LinkedHelper still running after kill");
        }
    }

    async fn close_unowned(&self) {
        let Some(port) = self.port else {
            return;
        };
        match close_browser(port, self.config.evaluate_timeout).await {
            Ok(()) => tracing::info!(port, "Asked LinkedHelper to close"),
            Err(e) => tracing::warn!(port, error = %e, "Best-effort close failed"),
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: plain kill(2) on a pid we spawned and have not reaped.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            tracing::warn!(pid, error = %std::io::Error::last_os_error(), "SIGTERM failed");
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

/// Pick the app executable: the override if it is usable, else the
/// platform default, else [`ServiceError::AppNotFound`].
pub fn resolve_executable(
    override_path: Option<&Path>,
    platform_default: Option<&Path>,
) -> Result<PathBuf, ServiceError> {
    if let Some(path) = override_path {
        if is_executable(path) {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(
            path = %path.display(),
            env_var = APP_PATH_ENV,
            "Override is not an executable file, trying platform default",
        );
    }

    match platform_default {
        Some(path) if is_executable(path) => Ok(path.to_path_buf()),
        _ => Err(ServiceError::AppNotFound { env_var: APP_PATH_ENV }),
    }
}

/// Where the installer puts the app on this platform.
pub fn platform_default_path() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        Some(PathBuf::from(
            "/Applications/linked-helper.app/Contents/MacOS/linked-helper",
        ))
    } else if cfg!(windows) {
        dirs::data_local_dir().map(|dir| {
            dir.join("Programs")
                .join("linked-helper")
                .join("linked-helper.exe")
        })
    } else {
        Some(PathBuf::from("/opt/linked-helper/linked-helper"))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

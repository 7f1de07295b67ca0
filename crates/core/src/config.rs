use std::path::PathBuf;
use std::time::Duration;

use crate::error::APP_PATH_ENV;

/// Default delay between spawning the app and declaring the launch good.
pub const DEFAULT_PROBE_DELAY_MS: u64 = 3000;

/// Service configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local desktop install of the
/// app. Unparseable values fall back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Explicit app executable, bypassing the platform default.
    pub app_path: Option<PathBuf>,
    /// Directory holding the app's per-account databases.
    pub data_dir: PathBuf,
    /// Launcher debug port; `None` lets the supervisor allocate one.
    pub launcher_port: Option<u16>,
    pub probe_delay: Duration,
    pub graceful_timeout: Duration,
    pub kill_timeout: Duration,
    pub evaluate_timeout: Duration,
    pub instance_port_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub settle_delay: Duration,
    pub idle_timeout: Duration,
}

impl ServiceConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                               | Default                       |
    /// |---------------------------------------|-------------------------------|
    /// | `LINKEDHELPER_PATH`                   | platform default              |
    /// | `LHREMOTE_DATA_DIR`                   | `<config dir>/linked-helper`  |
    /// | `LHREMOTE_LAUNCHER_PORT`              | allocated on launch           |
    /// | `LHREMOTE_PROBE_DELAY_MS`             | `3000`                        |
    /// | `LHREMOTE_GRACEFUL_TIMEOUT_SECS`      | `10`                          |
    /// | `LHREMOTE_KILL_TIMEOUT_SECS`          | `5`                           |
    /// | `LHREMOTE_EVALUATE_TIMEOUT_SECS`      | `30`                          |
    /// | `LHREMOTE_INSTANCE_PORT_TIMEOUT_SECS` | `60`                          |
    /// | `LHREMOTE_SHUTDOWN_TIMEOUT_SECS`      | `30`                          |
    /// | `LHREMOTE_SETTLE_DELAY_MS`            | `2000`                        |
    /// | `LHREMOTE_IDLE_TIMEOUT_SECS`          | `60`                          |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str, default: u64| {
            Duration::from_secs(parse_or(lookup(key), default))
        };
        let millis = |key: &str, default: u64| {
            Duration::from_millis(parse_or(lookup(key), default))
        };

        let app_path = lookup(APP_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let data_dir = lookup("LHREMOTE_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let launcher_port = lookup("LHREMOTE_LAUNCHER_PORT").and_then(|v| v.trim().parse().ok());

        Self {
            app_path,
            data_dir,
            launcher_port,
            probe_delay: millis("LHREMOTE_PROBE_DELAY_MS", DEFAULT_PROBE_DELAY_MS),
            graceful_timeout: secs("LHREMOTE_GRACEFUL_TIMEOUT_SECS", 10),
            kill_timeout: secs("LHREMOTE_KILL_TIMEOUT_SECS", 5),
            evaluate_timeout: secs("LHREMOTE_EVALUATE_TIMEOUT_SECS", 30),
            instance_port_timeout: secs("LHREMOTE_INSTANCE_PORT_TIMEOUT_SECS", 60),
            shutdown_timeout: secs("LHREMOTE_SHUTDOWN_TIMEOUT_SECS", 30),
            settle_delay: millis("LHREMOTE_SETTLE_DELAY_MS", 2000),
            idle_timeout: secs("LHREMOTE_IDLE_TIMEOUT_SECS", 60),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// The app's data directory under the platform config dir.
pub fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("linked-helper")
}

fn parse_or(value: Option<String>, default: u64) -> u64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> ServiceConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config.app_path, None);
        assert_eq!(config.launcher_port, None);
        assert_eq!(config.probe_delay, Duration::from_millis(3000));
        assert_eq!(config.graceful_timeout, Duration::from_secs(10));
        assert_eq!(config.kill_timeout, Duration::from_secs(5));
        assert_eq!(config.settle_delay, Duration::from_millis(2000));
        assert!(config.data_dir.ends_with("linked-helper"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("LINKEDHELPER_PATH", "/opt/lh/linked-helper"),
            ("LHREMOTE_DATA_DIR", "/tmp/lh-data"),
            ("LHREMOTE_LAUNCHER_PORT", "9222"),
            ("LHREMOTE_IDLE_TIMEOUT_SECS", "5"),
        ]);
        assert_eq!(config.app_path, Some(PathBuf::from("/opt/lh/linked-helper")));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/lh-data"));
        assert_eq!(config.launcher_port, Some(9222));
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = config_from(&[
            ("LINKEDHELPER_PATH", "   "),
            ("LHREMOTE_LAUNCHER_PORT", "not-a-port"),
            ("LHREMOTE_PROBE_DELAY_MS", "-1"),
        ]);
        assert_eq!(config.app_path, None);
        assert_eq!(config.launcher_port, None);
        assert_eq!(config.probe_delay, Duration::from_millis(3000));
    }
}

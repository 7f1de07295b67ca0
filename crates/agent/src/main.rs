//! `lhremote-agent` -- makes sure LinkedHelper is up and an account runs.
//!
//! Launches the app unless its launcher port already answers, connects
//! to the launcher, then either prints the configured accounts or starts
//! one account's instance (recovering from a stale crash) and prints the
//! outcome as JSON on stdout.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default | Description                              |
//! |------------------------|----------|---------|------------------------------------------|
//! | `LHREMOTE_ACCOUNT_ID`  | no       | --      | Account whose instance to start          |
//! | `LHREMOTE_QUIT_AFTER`  | no       | `false` | Quit the app again before exiting        |
//!
//! Every `LHREMOTE_*` timing variable and `LINKEDHELPER_PATH` are read by
//! [`ServiceConfig::from_env`].

use lhremote_cdp::discovery::ProcessPortDiscovery;
use lhremote_cdp::launcher::RemoteLauncher;
use lhremote_core::config::ServiceConfig;
use lhremote_core::error::ServiceError;
use lhremote_core::types::DbId;
use lhremote_services::app::AppService;
use lhremote_services::lifecycle::{start_instance_with_recovery, LifecycleConfig};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str =
    "lhremote_agent=info,lhremote_services=info,lhremote_cdp=info,lhremote_db=info";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let account_id: Option<DbId> = match std::env::var("LHREMOTE_ACCOUNT_ID") {
        Ok(v) => Some(v.trim().parse().unwrap_or_else(|_| {
            tracing::error!("LHREMOTE_ACCOUNT_ID must be a valid integer");
            std::process::exit(1);
        })),
        Err(_) => None,
    };
    let quit_after = std::env::var("LHREMOTE_QUIT_AFTER")
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    let config = ServiceConfig::from_env();
    tracing::info!(
        data_dir = %config.data_dir.display(),
        launcher_port = config.launcher_port,
        account_id,
        "Starting lhremote-agent",
    );

    let mut app = AppService::from_config(&config);
    let result = run(&mut app, &config, account_id).await;

    if quit_after {
        app.quit().await;
    }

    if let Err(e) = result {
        tracing::error!(error = %e, "lhremote-agent failed");
        std::process::exit(1);
    }
}

async fn run(
    app: &mut AppService,
    config: &ServiceConfig,
    account_id: Option<DbId>,
) -> Result<(), ServiceError> {
    let port = app.launch().await?;

    let mut launcher = RemoteLauncher::new(port).with_evaluate_timeout(config.evaluate_timeout);
    launcher.connect().await?;
    tracing::info!(port, "Connected to launcher");

    let report = match account_id {
        None => {
            let accounts = launcher.list_accounts().await?;
            tracing::info!(count = accounts.len(), "Listed accounts");
            serde_json::to_string_pretty(&accounts)
        }
        Some(account_id) => {
            let outcome = start_instance_with_recovery(
                &launcher,
                &ProcessPortDiscovery::new(),
                account_id,
                port,
                &LifecycleConfig::from(config),
            )
            .await?;
            serde_json::to_string_pretty(&outcome)
        }
    };

    launcher.disconnect().await;

    match report {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!(error = %e, "Failed to render report"),
    }
    Ok(())
}

//! Launch idempotence against a fake debug endpoint.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lhremote_services::app::{AppService, LaunchConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const VERSION_BODY: &str = r#"{"Browser":"Chrome/120.0.0.0","Protocol-Version":"1.3"}"#;

/// Answers every request with a `/json/version` body. Returns its port.
async fn serve_version() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    VERSION_BODY.len(),
                    VERSION_BODY,
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    port
}

/// A stand-in app that appends a line to `counter` each time it runs.
fn counting_app(dir: &Path, counter: &Path) -> PathBuf {
    let path = dir.join("linked-helper");
    std::fs::write(
        &path,
        format!("#!/bin/sh\necho run >> {}\nexec sleep 30\n", counter.display()),
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn runs(counter: &Path) -> usize {
    std::fs::read_to_string(counter)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

#[tokio::test]
async fn launch_is_a_no_op_when_port_answers() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("runs");
    let app = counting_app(dir.path(), &counter);
    let port = serve_version().await;

    let mut service = AppService::new(Some(port)).with_app_path(&app);
    assert!(service.is_running().await);

    assert_eq!(service.launch().await.unwrap(), port);
    assert_eq!(service.launch().await.unwrap(), port);

    assert_eq!(runs(&counter), 0);
    assert!(!service.owns_process());
}

#[tokio::test]
async fn launch_spawns_when_port_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("runs");
    let app = counting_app(dir.path(), &counter);

    let mut service = AppService::new(None)
        .with_app_path(&app)
        .with_launch_config(LaunchConfig {
            probe_delay: Duration::from_millis(300),
            graceful_timeout: Duration::from_secs(5),
            ..LaunchConfig::default()
        });

    let port = service.launch().await.unwrap();
    assert_eq!(service.port(), Some(port));
    assert!(service.owns_process());
    assert_eq!(runs(&counter), 1);

    service.quit().await;
    assert!(!service.owns_process());
}

#[tokio::test]
async fn relaunch_while_starting_reuses_owned_process() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("runs");
    // Never opens its debug port.
    let app = counting_app(dir.path(), &counter);

    let mut service = AppService::new(None)
        .with_app_path(&app)
        .with_launch_config(LaunchConfig {
            probe_delay: Duration::from_millis(300),
            graceful_timeout: Duration::from_secs(5),
            ..LaunchConfig::default()
        });

    let first = service.launch().await.unwrap();
    let second = service.launch().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(runs(&counter), 1);
    assert!(service.owns_process());

    service.quit().await;
    assert!(!service.owns_process());
}

#[tokio::test]
async fn relaunch_after_owned_process_exited_spawns_again() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("runs");
    let app = dir.path().join("linked-helper");
    std::fs::write(
        &app,
        format!("#!/bin/sh\necho run >> {}\nsleep 0.5\n", counter.display()),
    )
    .unwrap();
    std::fs::set_permissions(&app, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut service = AppService::new(None)
        .with_app_path(&app)
        .with_launch_config(LaunchConfig {
            probe_delay: Duration::from_millis(200),
            ..LaunchConfig::default()
        });

    let first = service.launch().await.unwrap();
    tokio::time::sleep(Duration::from_millis(800)).await;
    let second = service.launch().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(runs(&counter), 2);
    service.quit().await;
}

//! Scoped access to an account's database and instance bridge.
//!
//! [`with_database`] and [`with_instance_database`] acquire handles in a
//! fixed order, run a unit of work against them and release exactly what
//! was acquired, whether the work succeeded or not.
//!
//! ```ignore
//! let campaigns = with_database(&backend, 42, ContextOptions::default(), |ctx| {
//!     async move { ctx.db.list_campaigns(false).await }.boxed()
//! })
//! .await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use lhremote_cdp::discovery::PortDiscovery;
use lhremote_cdp::instance::InstanceBridge;
use lhremote_core::config::ServiceConfig;
use lhremote_core::error::ServiceError;
use lhremote_core::types::DbId;
use lhremote_db::locator::DatabaseLocator;
use lhremote_db::{Database, OpenOptions};

/// Options for a scoped unit of work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextOptions {
    /// Open the database read-only.
    pub read_only: bool,
}

impl From<ContextOptions> for OpenOptions {
    fn from(options: ContextOptions) -> Self {
        OpenOptions {
            read_only: options.read_only,
        }
    }
}

/// What [`with_database`] hands to its unit of work.
pub struct DatabaseContext<'a, Db> {
    pub account_id: DbId,
    pub db: &'a Db,
}

/// What [`with_instance_database`] hands to its unit of work.
pub struct InstanceDatabaseContext<'a, Instance, Db> {
    pub account_id: DbId,
    pub instance: &'a Instance,
    pub db: &'a Db,
}

/// How handles are found, opened and released.
#[async_trait]
pub trait ResourceBackend: Send + Sync {
    type Database: Send + Sync;
    type Instance: Send + Sync;

    async fn open_database(
        &self,
        account_id: DbId,
        options: ContextOptions,
    ) -> Result<Self::Database, ServiceError>;

    async fn close_database(&self, db: &Self::Database);

    async fn discover_instance_port(&self, launcher_port: u16) -> Result<Option<u16>, ServiceError>;

    /// An unconnected handle for the instance on `port`.
    fn instance(&self, port: u16) -> Self::Instance;

    async fn connect(&self, instance: &mut Self::Instance) -> Result<(), ServiceError>;

    async fn disconnect(&self, instance: &mut Self::Instance);
}

/// Run `work` against the account's database, closing it afterwards.
pub async fn with_database<B, F, T>(
    backend: &B,
    account_id: DbId,
    options: ContextOptions,
    work: F,
) -> Result<T, ServiceError>
where
    B: ResourceBackend + ?Sized,
    F: for<'a> FnOnce(DatabaseContext<'a, B::Database>) -> BoxFuture<'a, Result<T, ServiceError>>,
{
    let db = backend.open_database(account_id, options).await?;

    let result = work(DatabaseContext {
        account_id,
        db: &db,
    })
    .await;

    backend.close_database(&db).await;
    result
}

/// Run `work` against a connected instance bridge and the account's
/// database.
///
/// The bridge is connected before the database is opened; if connecting
/// fails the database is never touched.
pub async fn with_instance_database<B, F, T>(
    backend: &B,
    launcher_port: u16,
    account_id: DbId,
    options: ContextOptions,
    work: F,
) -> Result<T, ServiceError>
where
    B: ResourceBackend + ?Sized,
    F: for<'a> FnOnce(
        InstanceDatabaseContext<'a, B::Instance, B::Database>,
    ) -> BoxFuture<'a, Result<T, ServiceError>>,
{
    let port = backend
        .discover_instance_port(launcher_port)
        .await?
        .ok_or(ServiceError::InstanceNotRunning { launcher_port })?;

    let mut instance = backend.instance(port);
    if let Err(e) = backend.connect(&mut instance).await {
        backend.disconnect(&mut instance).await;
        return Err(e);
    }

    let db = match backend.open_database(account_id, options).await {
        Ok(db) => db,
        Err(e) => {
            backend.disconnect(&mut instance).await;
            return Err(e);
        }
    };

    let result = work(InstanceDatabaseContext {
        account_id,
        instance: &instance,
        db: &db,
    })
    .await;

    backend.close_database(&db).await;
    backend.disconnect(&mut instance).await;
    result
}

/// The real backend: files under the app's data dir and CDP sessions.
pub struct LiveBackend {
    locator: DatabaseLocator,
    discovery: Arc<dyn PortDiscovery>,
    evaluate_timeout: std::time::Duration,
}

impl LiveBackend {
    pub fn new(
        locator: DatabaseLocator,
        discovery: Arc<dyn PortDiscovery>,
        evaluate_timeout: std::time::Duration,
    ) -> Self {
        Self {
            locator,
            discovery,
            evaluate_timeout,
        }
    }

    pub fn from_config(config: &ServiceConfig, discovery: Arc<dyn PortDiscovery>) -> Self {
        Self::new(
            DatabaseLocator::new(config.data_dir.clone()),
            discovery,
            config.evaluate_timeout,
        )
    }
}

#[async_trait]
impl ResourceBackend for LiveBackend {
    type Database = Database;
    type Instance = InstanceBridge;

    async fn open_database(
        &self,
        account_id: DbId,
        options: ContextOptions,
    ) -> Result<Database, ServiceError> {
        let path = self.locator.discover(account_id)?;
        Database::open(&path, options.into())
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn close_database(&self, db: &Database) {
        db.close().await;
    }

    async fn discover_instance_port(&self, launcher_port: u16) -> Result<Option<u16>, ServiceError> {
        self.discovery.discover_instance_port(launcher_port).await
    }

    fn instance(&self, port: u16) -> InstanceBridge {
        InstanceBridge::new(port).with_evaluate_timeout(self.evaluate_timeout)
    }

    async fn connect(&self, instance: &mut InstanceBridge) -> Result<(), ServiceError> {
        instance.connect().await
    }

    async fn disconnect(&self, instance: &mut InstanceBridge) {
        instance.disconnect().await;
    }
}

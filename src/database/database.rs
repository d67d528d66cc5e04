use std::sync::Arc;

use log::info;

use crate::config::DbConfig;
use crate::error::Result;
use crate::storage::StorageClient;
use crate::sync::Db;
use crate::sync::Monitor;
use crate::sync::ReplicaTransport;

/// One primary database being replicated: the Sync Engine, its Monitor
/// Loop, and the replica transports it publishes to.
pub struct Database {
    config: DbConfig,
}

impl Database {
    pub fn try_create(config: DbConfig) -> Result<Self> {
        Ok(Database { config })
    }

    /// Opens the database, spawns its Monitor Loop and runs until
    /// cancelled by ctrl-c. One `run()` per configured `[[database]]`
    /// entry; `cmd::Replicate` spawns one task per `Database`.
    pub async fn run(&self) -> Result<()> {
        let mut db = Db::new(&self.config.db).with_tunables(self.config.checkpoint_tunables());
        db.open().await?;

        let mut transports: Vec<Arc<dyn ReplicaTransport>> =
            Vec::with_capacity(self.config.replicate.len());
        for storage in &self.config.replicate {
            transports.push(Arc::new(StorageClient::try_create(
                &self.config.db,
                storage,
            )?));
        }

        info!(
            "replicating {} to {} replica(s)",
            self.config.db,
            transports.len()
        );

        let (monitor, _rx) = Monitor::spawn(db, self.config.monitor_interval(), transports);

        let _ = tokio::signal::ctrl_c().await;
        monitor.close().await
    }
}

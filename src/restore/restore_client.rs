use std::fs;
use std::path::Path;

use log::info;
use rusqlite::Connection;

use crate::base::decompress_buffer;
use crate::base::wal_path;
use crate::config::DbConfig;
use crate::config::RestoreOptions;
use crate::config::StorageConfig;
use crate::error::Error;
use crate::error::Result;
use crate::storage::StorageClient;

/// Reconstructs a primary database from a replica: the latest (or a
/// named) generation's snapshot plus whatever shadow WAL frames landed
/// after it.
pub struct RestoreClient {
    db: String,
    replicas: Vec<StorageConfig>,
}

impl RestoreClient {
    pub fn try_create(db: String, replicas: Vec<StorageConfig>) -> Result<Self> {
        if replicas.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "database {} has no configured replicate targets to restore from",
                db
            )));
        }
        Ok(Self { db, replicas })
    }

    fn pick_replica(&self, name: Option<&str>) -> Result<&StorageConfig> {
        match name {
            Some(name) => self.replicas.iter().find(|r| r.name == name).ok_or_else(|| {
                Error::InvalidArg(format!("no configured replica target named {}", name))
            }),
            None => Ok(&self.replicas[0]),
        }
    }

    pub async fn run(
        &self,
        output: &str,
        overwrite: bool,
        generation: Option<&str>,
        replica: Option<&str>,
    ) -> Result<()> {
        if !overwrite && fs::exists(output)? {
            return Err(Error::OverwriteDbError(format!(
                "{} already exists; pass --overwrite to replace it",
                output
            )));
        }

        let storage_config = self.pick_replica(replica)?;
        let client = StorageClient::try_create(&self.db, storage_config)?;

        let generation = client.latest_generation(generation).await?;
        info!(
            "restoring {} from replica {} generation {}",
            self.db,
            storage_config.name,
            generation.as_str()
        );

        let snapshots = client.snapshots(&generation).await?;
        let snapshot = snapshots.last().ok_or_else(|| {
            Error::NoSnapshotError(format!("no snapshot for generation {}", generation.as_str()))
        })?;

        let compressed = client.read_snapshot(snapshot).await?;
        let db_bytes = decompress_buffer(compressed)?;
        fs::write(output, &db_bytes)?;

        let segments = client.wal_segments(&generation).await?;
        let mut wal_bytes = Vec::new();
        for segment in segments.iter().filter(|s| s.index >= snapshot.index) {
            let compressed = client.read_wal_segment(segment).await?;
            wal_bytes.extend(decompress_buffer(compressed)?);
        }

        if wal_bytes.is_empty() {
            info!("no shadow wal frames past the snapshot; restore is exact");
            return Ok(());
        }

        let wal_file = wal_path(Path::new(output));
        fs::write(&wal_file, &wal_bytes)?;

        let conn = Connection::open(output)?;
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        drop(conn);

        if wal_file.exists() {
            let _ = fs::remove_file(&wal_file);
        }

        Ok(())
    }
}

pub async fn run_restore(config: &DbConfig, options: &RestoreOptions) -> Result<()> {
    let restore = RestoreClient::try_create(config.db.clone(), config.replicate.clone())?;

    restore
        .run(
            &options.output_path(),
            options.overwrite,
            options.generation.as_deref(),
            options.replica.as_deref(),
        )
        .await?;

    Ok(())
}

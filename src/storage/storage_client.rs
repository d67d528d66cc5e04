use std::path::Path;

use chrono::DateTime;
use chrono::Utc;
use opendal::Metakey;
use opendal::Operator;

use super::init_operator;
use crate::base::compress_buffer;
use crate::base::compress_file;
use crate::base::parse_snapshot_path;
use crate::base::parse_wal_segment_path;
use crate::base::path_base;
use crate::base::remote_generations_dir;
use crate::base::snapshot_file;
use crate::base::snapshots_dir;
use crate::base::walsegment_file;
use crate::base::walsegments_dir;
use crate::base::Generation;
use crate::config::StorageConfig;
use crate::error::Error;
use crate::error::Result;
use crate::position::Position;
use crate::sync::ReplicaTransport;

/// An `opendal`-backed replica: receives shadow WAL segments and snapshots
/// published by the Monitor Loop and stores them under a flat, per-database
/// key namespace (spec §9 "dynamic dispatch over replicas").
#[derive(Debug, Clone)]
pub struct StorageClient {
    name: String,
    operator: Operator,
    db_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotInfo {
    pub generation: Generation,
    pub index: u64,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WalSegmentInfo {
    pub generation: Generation,
    pub index: u64,
    pub offset: u64,
    pub size: u64,
}

impl StorageClient {
    pub fn try_create(db_path: impl AsRef<Path>, config: &StorageConfig) -> Result<Self> {
        Ok(Self {
            name: config.name.clone(),
            operator: init_operator(&config.params)?,
            db_name: path_base(db_path.as_ref())?,
        })
    }

    pub async fn write_wal_segment(&self, pos: &Position, raw_segment: &[u8]) -> Result<()> {
        let file = walsegment_file(&self.db_name, pos.generation.as_str(), pos.index, pos.offset);
        let compressed = compress_buffer(raw_segment)?;
        self.operator.write(&file, compressed).await?;
        Ok(())
    }

    pub async fn write_snapshot(&self, pos: &Position, db_path: &Path) -> Result<SnapshotInfo> {
        let file = snapshot_file(&self.db_name, pos.generation.as_str(), pos.index);
        let compressed = compress_file(db_path)?;
        let info = SnapshotInfo {
            generation: pos.generation.clone(),
            index: pos.index,
            size: compressed.len() as u64,
            created_at: Utc::now(),
        };
        self.operator.write(&file, compressed).await?;
        Ok(info)
    }

    pub async fn snapshots(&self, generation: &Generation) -> Result<Vec<SnapshotInfo>> {
        let dir = snapshots_dir(&self.db_name, generation.as_str());
        let entries = self
            .operator
            .list_with(&dir)
            .metakey(Metakey::ContentLength)
            .metakey(Metakey::LastModified)
            .await?;

        let mut snapshots = vec![];
        for entry in entries {
            let metadata = entry.metadata();
            if metadata.is_dir() {
                continue;
            }
            let index = parse_snapshot_path(entry.path())?;
            snapshots.push(SnapshotInfo {
                generation: generation.clone(),
                index,
                size: metadata.content_length(),
                created_at: metadata.last_modified().unwrap_or_else(Utc::now),
            })
        }
        snapshots.sort_by_key(|s| s.index);

        Ok(snapshots)
    }

    pub async fn wal_segments(&self, generation: &Generation) -> Result<Vec<WalSegmentInfo>> {
        let dir = walsegments_dir(&self.db_name, generation.as_str());
        let entries = self
            .operator
            .list_with(&dir)
            .metakey(Metakey::ContentLength)
            .await?;

        let mut wal_segments = vec![];
        for entry in entries {
            let metadata = entry.metadata();
            if metadata.is_dir() {
                continue;
            }
            let (index, offset) = parse_wal_segment_path(entry.path())?;
            wal_segments.push(WalSegmentInfo {
                generation: generation.clone(),
                index,
                offset,
                size: metadata.content_length(),
            })
        }
        wal_segments.sort_by(|a, b| (a.index, a.offset).cmp(&(b.index, b.offset)));

        Ok(wal_segments)
    }

    pub async fn read_snapshot(&self, info: &SnapshotInfo) -> Result<Vec<u8>> {
        let file = snapshot_file(&self.db_name, info.generation.as_str(), info.index);
        Ok(self.operator.read(&file).await?.to_vec())
    }

    pub async fn read_wal_segment(&self, info: &WalSegmentInfo) -> Result<Vec<u8>> {
        let file = walsegment_file(
            &self.db_name,
            info.generation.as_str(),
            info.index,
            info.offset,
        );
        Ok(self.operator.read(&file).await?.to_vec())
    }

    /// The most recent generation this replica has any data for, or the
    /// requested one if `generation` names a specific one. Used by the
    /// restore tool when no `--generation` is given.
    pub async fn latest_generation(&self, generation: Option<&str>) -> Result<Generation> {
        if let Some(name) = generation {
            return Generation::try_from_name(name);
        }

        let dir = remote_generations_dir(&self.db_name);
        let entries = self.operator.list(&dir).await?;
        let mut latest: Option<Generation> = None;
        for entry in entries {
            if !entry.metadata().is_dir() {
                continue;
            }
            let name = path_base(Path::new(entry.path().trim_end_matches('/')))?;
            let Ok(id) = Generation::try_from_name(&name) else {
                continue;
            };
            latest = Some(match latest {
                Some(cur) if cur >= id => cur,
                _ => id,
            });
        }

        latest.ok_or_else(|| Error::NoGenerationError("no generation found on replica".into()))
    }
}

#[async_trait::async_trait]
impl ReplicaTransport for StorageClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, pos: Position, segment: Option<Vec<u8>>) -> Result<()> {
        if let Some(segment) = segment {
            self.write_wal_segment(&pos, &segment).await?;
        }
        Ok(())
    }

    async fn snapshot(&self, pos: Position, compressed: Vec<u8>) -> Result<()> {
        let file = snapshot_file(&self.db_name, pos.generation.as_str(), pos.index);
        self.operator.write(&file, compressed).await?;
        Ok(())
    }
}

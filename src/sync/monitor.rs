use std::fs::File;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;

use log::error;
use log::warn;
use tokio::sync::watch;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::engine::Db;
use super::engine::SyncState;
use crate::base::compress_file;
use crate::error::Result;
use crate::position::Position;

/// A destination a generation's replicated bytes are pushed to. Stored as
/// `Arc<dyn ReplicaTransport>` so the Monitor Loop can fan a single
/// `Position` update out to any number of replicas.
#[async_trait::async_trait]
pub trait ReplicaTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Called on every tick that advances `Position`. `segment` carries the
    /// shadow WAL bytes newly appended since the transport's own last
    /// acknowledged position, when the caller has them handy; a transport
    /// that only cares about freshness (e.g. a metrics sink) can ignore it.
    async fn notify(&self, pos: Position, segment: Option<Vec<u8>>) -> Result<()>;

    /// Called once per generation, right after it starts: `compressed` is
    /// the full primary database file, lz4-compressed. Replicas use this
    /// as the base a later restore replays shadow WAL segments onto.
    /// Default no-op for transports that only stream WAL bytes.
    async fn snapshot(&self, pos: Position, compressed: Vec<u8>) -> Result<()> {
        let _ = (pos, compressed);
        Ok(())
    }
}

/// Default interval between sync ticks. Zero disables the loop entirely -
/// tests then call `Db::sync` directly.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Bytes newly appended to the shadow WAL between `last_pos` and `pos`,
/// read directly from the shadow segment on disk. `None` if nothing new
/// landed (shouldn't happen when `pos != last_pos`, but a transport should
/// treat an empty publish as a no-op rather than error) or if the segment
/// can no longer be read (e.g. pruned already).
fn read_new_segment_bytes(db: &Db, last_pos: &Position, pos: &Position) -> Option<Vec<u8>> {
    if pos.offset == 0 {
        return None;
    }
    let same_segment = pos.generation == last_pos.generation && pos.index == last_pos.index;
    let start = if same_segment { last_pos.offset } else { 0 };
    if start >= pos.offset {
        return None;
    }

    let path = db.shadow_wal_path(&pos.generation, pos.index);
    let mut file = File::open(path).ok()?;
    file.seek(SeekFrom::Start(start)).ok()?;
    let mut buf = vec![0u8; (pos.offset - start) as usize];
    file.read_exact(&mut buf).ok()?;
    Some(buf)
}

/// Runs one `Db`'s `sync()` on a fixed interval and publishes its
/// `Position` to every registered replica transport. One Monitor Loop per
/// `Db`; it owns the handle for the lifetime of the task.
pub struct Monitor {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

impl Monitor {
    /// Spawns the monitor task. `interval` of `Duration::ZERO` disables the
    /// loop: the task exits immediately without ever calling `sync()`.
    pub fn spawn(
        mut db: Db,
        interval: Duration,
        transports: Vec<Arc<dyn ReplicaTransport>>,
    ) -> (Self, watch::Receiver<Position>) {
        let (tx, rx) = watch::channel(Position::default());
        let shutdown = Arc::new(Notify::new());
        let task_shutdown = shutdown.clone();

        let handle = tokio::spawn(async move {
            if interval.is_zero() {
                return;
            }
            let mut ticker = tokio::time::interval(interval);
            let mut last_pos = Position::default();
            loop {
                tokio::select! {
                    _ = task_shutdown.notified() => {
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = db.sync().await {
                            warn!("sync failed for {}: {}", db.path().display(), e);
                            continue;
                        }
                        let pos = db.pos();
                        if pos == last_pos {
                            continue;
                        }
                        if tx.send(pos.clone()).is_err() {
                            // no receivers left subscribed to the watch channel
                        }

                        if matches!(db.state(), SyncState::NewGeneration) {
                            match compress_file(db.path()) {
                                Ok(compressed) => {
                                    for transport in &transports {
                                        if let Err(e) =
                                            transport.snapshot(pos.clone(), compressed.clone()).await
                                        {
                                            error!(
                                                "replica transport {} failed to snapshot: {}",
                                                transport.name(),
                                                e
                                            );
                                        }
                                    }
                                }
                                Err(e) => warn!("failed to snapshot {}: {}", db.path().display(), e),
                            }
                        }

                        let segment = read_new_segment_bytes(&db, &last_pos, &pos);
                        for transport in &transports {
                            if let Err(e) = transport.notify(pos.clone(), segment.clone()).await {
                                error!(
                                    "replica transport {} failed to notify: {}",
                                    transport.name(),
                                    e
                                );
                            }
                        }
                        last_pos = pos;
                    }
                }
            }
        });

        (Monitor { handle, shutdown }, rx)
    }

    /// Signals the loop to stop after its in-flight `sync()` (if any)
    /// finishes, then waits for the task to exit. Never aborts mid-sync.
    pub async fn close(self) -> Result<()> {
        self.shutdown.notify_one();
        let _ = self.handle.await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingTransport {
        name: String,
    }

    #[async_trait::async_trait]
    impl ReplicaTransport for RecordingTransport {
        fn name(&self) -> &str {
            &self.name
        }

        async fn notify(&self, _pos: Position, _segment: Option<Vec<u8>>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn disabled_interval_never_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::new(dir.path().join("missing.db"));
        let (monitor, mut rx) = Monitor::spawn(db, Duration::ZERO, vec![]);

        assert!(rx.has_changed().is_ok());
        assert_eq!(*rx.borrow_and_update(), Position::default());
        monitor.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::new(dir.path().join("missing.db"));
        let transport: Arc<dyn ReplicaTransport> = Arc::new(RecordingTransport {
            name: "test".to_string(),
        });
        let (monitor, _rx) = Monitor::spawn(db, Duration::from_millis(10), vec![transport]);
        tokio::time::sleep(Duration::from_millis(30)).await;
        monitor.close().await.unwrap();
    }

    #[tokio::test]
    async fn publishes_position_and_segment_bytes_for_a_real_database() {
        use parking_lot::Mutex;
        use rusqlite::Connection;

        struct CapturingTransport {
            notified: Arc<Mutex<Vec<(Position, Option<Vec<u8>>)>>>,
            snapshots: Arc<Mutex<Vec<Position>>>,
        }

        #[async_trait::async_trait]
        impl ReplicaTransport for CapturingTransport {
            fn name(&self) -> &str {
                "capturing"
            }

            async fn notify(&self, pos: Position, segment: Option<Vec<u8>>) -> Result<()> {
                self.notified.lock().push((pos, segment));
                Ok(())
            }

            async fn snapshot(&self, pos: Position, _compressed: Vec<u8>) -> Result<()> {
                self.snapshots.lock().push(pos);
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("app.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch("PRAGMA journal_mode=WAL; CREATE TABLE t(v INTEGER);")
            .unwrap();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();

        let notified = Arc::new(Mutex::new(vec![]));
        let snapshots = Arc::new(Mutex::new(vec![]));
        let transport: Arc<dyn ReplicaTransport> = Arc::new(CapturingTransport {
            notified: notified.clone(),
            snapshots: snapshots.clone(),
        });

        let db = Db::new(&db_path);
        let (monitor, _rx) = Monitor::spawn(db, Duration::from_millis(10), vec![transport]);
        tokio::time::sleep(Duration::from_millis(100)).await;
        monitor.close().await.unwrap();

        assert!(!snapshots.lock().is_empty());
        let calls = notified.lock();
        assert!(!calls.is_empty());
        assert!(calls.iter().any(|(_, segment)| segment.is_some()));
    }
}

mod engine;
mod monitor;

pub use engine::CheckpointTunables;
pub use engine::Db;
pub use engine::SyncState;
pub use monitor::Monitor;
pub use monitor::ReplicaTransport;
pub use monitor::DEFAULT_MONITOR_INTERVAL;

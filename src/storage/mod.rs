mod operator;
mod storage_client;

pub(crate) use operator::init_operator;
pub use storage_client::SnapshotInfo;
pub use storage_client::StorageClient;
pub use storage_client::WalSegmentInfo;
